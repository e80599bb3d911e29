//! Shared test harness modules for the SRD CLI.

use super::*;

mod helpers;
mod unit;
