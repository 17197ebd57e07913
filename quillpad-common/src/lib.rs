pub mod form;
pub mod model;
pub mod util;
