//! Patch an LK image on disk.
//!
//! Replaces the prologue of the verified-boot warning routine with a
//! `return 0`, which is the classic way to silence the unlocked-bootloader
//! splash on these devices:
//!
//!   30b583b002ab:       00207047:
//!   push {r4, r5, lr}   movs r0, #0
//!   sub  sp, #0xc       bx   lr
//!   add  r3, sp, #8

use std::env;
use std::process::ExitCode;

use lkimg::{LkImage, LkImageError};

fn main() -> ExitCode {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: apply_patch <lk.img>");
        return ExitCode::FAILURE;
    };

    let mut image = match LkImage::from_file(&path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let needle = [0x30, 0xB5, 0x83, 0xB0, 0x02, 0xAB];
    let patch = [0x00, 0x20, 0x70, 0x47];

    match image.apply_patch(&needle, &patch, None) {
        Ok(()) => {}
        Err(LkImageError::NeedleNotFound { needle }) => {
            eprintln!("Needle {needle} not found in the LK image.");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = image.save("patched_lk.img") {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    println!("Patched LK image saved to patched_lk.img");
    ExitCode::SUCCESS
}
