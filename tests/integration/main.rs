//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulated bench.  All tests run on the host with virtual
//! time; no real hardware required.

mod cycle_tests;
mod mock_hw;
mod scheduler_tests;
mod service_tests;
