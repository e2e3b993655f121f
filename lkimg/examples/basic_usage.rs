//! Basic usage example for lkimg

use lkimg::{CertType, LkImage, NewPartition};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Building a small LK image with lkimg...");

    // Start from an empty image and add two partitions.
    let mut image = LkImage::from_bytes(Vec::new())?;
    image.add_partition(
        NewPartition::new("lk", b"bootloader code".to_vec())
            .extended(true)
            .load_address(0x4800_0000),
    )?;
    image.add_partition(
        NewPartition::new("lk_main_dtb", b"device tree".to_vec()).extended(true),
    )?;

    // Attach a certificate to lk. Certificates are two-phase: the byte
    // stream only picks them up after an explicit rebuild.
    image.add_certificate("lk", b"signing certificate".to_vec(), CertType::Cert1)?;
    image.rebuild();

    image.save("demo_lk.img")?;
    println!("Image written to demo_lk.img ({} bytes)", image.as_bytes().len());

    // Parse it back and show what is inside.
    let parsed = LkImage::from_file("demo_lk.img")?;
    println!();
    println!(
        "LK image version {} with {} partition(s)",
        parsed.version(),
        parsed.len()
    );
    for partition in parsed.partitions() {
        println!();
        println!("{}", partition.summary());
        for cert in partition.certs() {
            println!("  certificate: {} ({} bytes)", cert.name(), cert.data().len());
        }
    }

    Ok(())
}
