pub mod run;
pub mod summary;
pub mod util;
pub mod validate;
