// Binding converter - uses the in-process toolkit
//
// Advantages:
// - No process spawn per conversion
// - Can inspect dimensionality, so 3D generation only runs when needed
// - Supports charge and multiplicity overrides
//
// Disadvantages:
// - Cannot stream from an open handle; inputs are loaded into memory
// - Round-trips cdx unreliably (handled by the selector)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::converter::errors::ConvertError;
use crate::converter::models::{ConversionOutput, ConvertOptions, InputDescriptor};
use crate::converter::toolkit::{LogSuppression, Molecule, MoleculeToolkit};
use crate::converter::traits::{resolve_output_format, Converter, IMAGE_FORMAT};

/// Converter backed by an in-process [`MoleculeToolkit`]
pub struct BindingConverter {
    toolkit: Arc<dyn MoleculeToolkit>,
    input: InputDescriptor,
}

impl BindingConverter {
    pub fn new(toolkit: Arc<dyn MoleculeToolkit>, input: InputDescriptor) -> Self {
        Self { toolkit, input }
    }

    /// Load the molecule to convert; only the first one of a file is used.
    fn load_molecule(&mut self) -> Result<Box<dyn Molecule>, ConvertError> {
        let format = self.input.format().as_str().to_string();
        let name = self.input.name();
        let parse_failed = |source| ConvertError::ParseFailed {
            input: name.clone(),
            source,
        };

        if let Some(buffer) = self.input.load_bytes()? {
            return self.toolkit.read_string(&format, buffer).map_err(parse_failed);
        }

        let path = self
            .input
            .path()
            .ok_or_else(|| ConvertError::InvalidArgument("input has no source".to_string()))?;
        let mut molecules = self.toolkit.read_file(&format, path).map_err(parse_failed)?;

        match molecules.next() {
            Some(molecule) => molecule.map_err(parse_failed),
            None => Err(ConvertError::EmptyInput(name.clone())),
        }
    }
}

#[async_trait]
impl Converter for BindingConverter {
    fn name(&self) -> &'static str {
        self.toolkit.name()
    }

    fn input(&self) -> &InputDescriptor {
        &self.input
    }

    async fn convert(
        &mut self,
        output_format: Option<&str>,
        output_path: Option<&Path>,
        options: &ConvertOptions,
    ) -> Result<ConversionOutput, ConvertError> {
        let output_format = resolve_output_format(output_format, output_path)?;
        options.validate()?;

        // Keep the toolkit quiet; we report problems ourselves.
        let toolkit = Arc::clone(&self.toolkit);
        let _quiet = LogSuppression::new(toolkit.as_ref());

        // The binding only regenerates coordinates for inputs lacking 3D,
        // so attempting it is the safe default.
        let gen3d = options.gen3d.unwrap_or(true);

        // The toolkit misbehaves on an empty format string.
        if self.input.format().is_empty() {
            return Err(ConvertError::InvalidArgument(format!(
                "Cannot convert file '{}'; input format is empty",
                self.input.name()
            )));
        }

        let mut molecule = self.load_molecule()?;

        if let Some(charge) = options.charge {
            molecule.set_total_charge(charge);
        }
        if let Some(multiplicity) = options.multiplicity {
            molecule.set_total_spin_multiplicity(multiplicity);
        }

        let dimension = molecule.dimension();
        if dimension != 3 && gen3d {
            log::warn!(
                "Generating 3D coordinates from {}D file '{}'; this will scramble atom coordinates",
                dimension,
                self.input.name()
            );
            molecule.generate_3d()?;
        }

        if options.add_hydrogens {
            molecule.add_hydrogens()?;
        }

        match output_path {
            // resolve_output_format guarantees a path for images
            Some(path) if output_format.is(IMAGE_FORMAT) => {
                molecule.draw(path)?;
                Ok(ConversionOutput::Written(path.to_path_buf()))
            }
            Some(path) => {
                molecule.write_file(output_format.as_str(), path, true)?;
                Ok(ConversionOutput::Written(path.to_path_buf()))
            }
            None => Ok(ConversionOutput::Content(
                molecule.write(output_format.as_str())?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::testing::FakeToolkit;
    use std::fs;

    fn converter(toolkit: &Arc<FakeToolkit>, input: InputDescriptor) -> BindingConverter {
        let toolkit: Arc<dyn MoleculeToolkit> = toolkit.clone();
        BindingConverter::new(toolkit, input)
    }

    fn text(output: ConversionOutput) -> String {
        output.as_text().unwrap().into_owned()
    }

    #[tokio::test]
    async fn test_2d_buffer_gets_3d_by_default() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=2", "cml"));

        let out = conv
            .convert(Some("xyz"), None, &ConvertOptions::default())
            .await
            .unwrap();
        assert_eq!(text(out), "xyz dim=3 charge=None mult=None h=true\n");
        assert!(toolkit.calls().contains(&"generate_3d".to_string()));
    }

    #[tokio::test]
    async fn test_3d_input_is_not_regenerated() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=3", "xyz"));

        conv.convert(Some("cml"), None, &ConvertOptions::default())
            .await
            .unwrap();
        assert!(!toolkit.calls().contains(&"generate_3d".to_string()));
    }

    #[tokio::test]
    async fn test_gen3d_disabled() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=2", "cml"));
        let options = ConvertOptions::default().with_gen3d(Some(false));

        let out = conv.convert(Some("xyz"), None, &options).await.unwrap();
        assert_eq!(text(out), "xyz dim=2 charge=None mult=None h=true\n");
    }

    #[tokio::test]
    async fn test_charge_and_multiplicity_before_3d() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=0", "smi"));
        let options = ConvertOptions::default()
            .with_charge(Some(-1))
            .with_multiplicity(Some(2))
            .with_add_hydrogens(false);

        let out = conv.convert(Some("xyz"), None, &options).await.unwrap();
        assert_eq!(text(out), "xyz dim=3 charge=Some(-1) mult=Some(2) h=false\n");

        let calls = toolkit.calls();
        let pos = |name: &str| calls.iter().position(|c| c == name).unwrap();
        assert!(pos("set_total_charge") < pos("generate_3d"));
        assert!(pos("set_total_spin_multiplicity") < pos("generate_3d"));
        assert!(!calls.contains(&"add_hydrogens".to_string()));
    }

    #[tokio::test]
    async fn test_logging_suppressed_during_call() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=3", "xyz"));

        conv.convert(Some("cml"), None, &ConvertOptions::default())
            .await
            .unwrap();
        assert_eq!(toolkit.calls()[0], "read_string xyz [log off]");
        assert!(toolkit.logging_enabled());
    }

    #[tokio::test]
    async fn test_logging_restored_after_failure() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("not a molecule", "xyz"));

        let err = conv
            .convert(Some("cml"), None, &ConvertOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ParseFailed { .. }));
        assert_eq!(err.to_string(), "Failed to parse file '(file loaded from memory)'");
        assert!(toolkit.logging_enabled());
    }

    #[tokio::test]
    async fn test_png_without_path_is_invalid() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=2", "cml"));

        let err = conv
            .convert(Some("png"), None, &ConvertOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidArgument(_)));
        assert!(toolkit.calls().is_empty());
    }

    #[tokio::test]
    async fn test_png_is_drawn_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("benzene.png");
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=2", "cml"));

        let out = conv
            .convert(None, Some(&target), &ConvertOptions::default())
            .await
            .unwrap();
        assert_eq!(out, ConversionOutput::Written(target.clone()));
        assert_eq!(fs::read(&target).unwrap(), b"\x89PNG");
        assert!(toolkit.calls().contains(&"draw".to_string()));
    }

    #[tokio::test]
    async fn test_empty_input_format_is_invalid() {
        let toolkit = Arc::new(FakeToolkit::new());
        let mut conv = converter(&toolkit, InputDescriptor::from_buffer("dim=2", ""));

        let err = conv
            .convert(Some("xyz"), None, &ConvertOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidArgument(_)));
        assert!(toolkit.logging_enabled());
    }

    #[tokio::test]
    async fn test_path_input_uses_first_molecule_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("two.cml");
        fs::write(&source, "dim=3\ndim=2\n").unwrap();
        let target = dir.path().join("out.xyz");
        fs::write(&target, "stale").unwrap();

        let toolkit = Arc::new(FakeToolkit::new());
        let input = InputDescriptor::from_path(&source, None).unwrap();
        let mut conv = converter(&toolkit, input);

        let out = conv
            .convert(None, Some(&target), &ConvertOptions::default())
            .await
            .unwrap();
        assert_eq!(out, ConversionOutput::Written(target.clone()));
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "xyz dim=3 charge=None mult=None h=true\n"
        );
        assert!(!toolkit.calls().contains(&"generate_3d".to_string()));
    }

    #[tokio::test]
    async fn test_file_without_molecules() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("empty.cml");
        fs::write(&source, "\n").unwrap();

        let toolkit = Arc::new(FakeToolkit::new());
        let input = InputDescriptor::from_path(&source, None).unwrap();
        let mut conv = converter(&toolkit, input);

        let err = conv
            .convert(Some("xyz"), None, &ConvertOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyInput(_)));
        assert!(err.to_string().contains("empty.cml"));
    }

    #[tokio::test]
    async fn test_handle_input_is_loaded_into_memory() {
        let toolkit = Arc::new(FakeToolkit::new());
        let reader = std::io::Cursor::new(b"dim=3".to_vec());
        let mut conv = converter(&toolkit, InputDescriptor::from_reader(reader, "xyz"));

        let first = conv
            .convert(Some("cml"), None, &ConvertOptions::default())
            .await
            .unwrap();
        let second = conv
            .convert(Some("cml"), None, &ConvertOptions::default())
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
