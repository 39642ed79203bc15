/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Subprocess and filesystem helpers for the OTFAD image tools.

--*/

pub mod exec;
pub mod fs;

pub use exec::exec;
