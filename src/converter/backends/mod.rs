// Converter backends

pub mod binding;
pub mod obabel;

pub use binding::BindingConverter;
pub use obabel::{ObabelConverter, ObabelSettings, BABEL_LIBDIR, OBABEL_EXECUTABLE};
