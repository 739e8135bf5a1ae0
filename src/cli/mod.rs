pub mod plot;
pub mod run;
