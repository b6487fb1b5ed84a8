pub mod context;
pub mod object;
pub mod runtime;
