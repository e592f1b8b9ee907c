pub mod agenda;
pub mod collection;
pub mod credentials;
pub mod event;
pub mod normalize;
pub mod report;
pub mod source;
