pub mod av;
pub mod hv;
pub mod module;
pub mod native;
pub mod procedure;
pub mod reference;
