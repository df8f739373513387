//! droidstudy - app selection and results analysis for an Android
//! automated-testing study
//!
//! The [`selection`] pipeline picks study subjects from the F-Droid catalog;
//! the [`analysis`] pipeline turns the experiment results tree into tables,
//! charts and a Mann-Whitney / Vargha-Delaney comparison.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod selection;
