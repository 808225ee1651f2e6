//! # Wavecast Sheets
//!
//! Row store backed by a spreadsheet-as-JSON HTTP API (sheet.best style:
//! `GET ?_format=records`, `PATCH /{row}`, `POST` to append).
//!
//! Rows arrive loosely typed: every cell may be a string, a number or null.
//! `rows` turns them into validated records and quarantines the rest.

pub mod client;
pub mod rows;

pub use client::SheetStore;
