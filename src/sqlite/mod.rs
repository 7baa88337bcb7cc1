//! `SQLite` driver built on rusqlite.
//!
//! - params: conversion from middleware values to rusqlite values
//! - query: row extraction and record building
//! - driver: the [`crate::driver::Driver`] implementation

mod driver;
pub mod params;
pub mod query;

pub use driver::SqliteDriver;
