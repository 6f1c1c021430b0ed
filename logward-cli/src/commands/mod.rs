pub mod archive;
pub mod check;
pub mod prune;
pub mod run;
