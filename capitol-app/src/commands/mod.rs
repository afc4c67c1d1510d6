pub mod account;
pub mod health;
pub mod run;
pub mod serve;
