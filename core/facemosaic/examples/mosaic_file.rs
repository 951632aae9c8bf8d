//! Run the face mosaic pipeline on an image file and print what was found.
//!
//! Usage:
//!   cargo run --example mosaic_file -- <input> [output] [ratio]
//!
//! Without an output path the result goes to `mosaic.<ext>`, where `<ext>`
//! follows the result format (PNG, or the input format when no face was found).

use std::sync::Arc;

use facemosaic::{MosaicPipeline, RustfaceDetector, DEFAULT_RATIO};

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(input_path) = args.next() else {
        eprintln!("usage: mosaic_file <input> [output] [ratio]");
        std::process::exit(2);
    };
    let output_path = args.next();
    let ratio = args
        .next()
        .map(|r| r.parse::<f32>().expect("ratio must be a number"))
        .unwrap_or(DEFAULT_RATIO);

    let detector = RustfaceDetector::load_default().expect("failed to load model");
    let pipeline = MosaicPipeline::new(Arc::new(detector)).ratio(ratio);

    let input = std::fs::read(&input_path).unwrap();
    let result = pipeline.process_image(&input).unwrap();

    println!(
        "=== {input_path} ({}x{}, {} bytes) ===",
        result.width, result.height, result.original_size
    );
    if result.is_passthrough() {
        println!("  NO FACES DETECTED, output is the input unchanged");
    } else {
        println!("  Mosaicked {} face(s):", result.faces.len());
        for (i, face) in result.faces.iter().enumerate() {
            println!(
                "    face {i}: bbox=({}, {}, {}x{})",
                face.x, face.y, face.width, face.height
            );
        }
    }

    let output_path = output_path.unwrap_or_else(|| format!("mosaic.{}", result.extension()));
    std::fs::write(&output_path, &result.data).unwrap();
    println!("  → wrote {} bytes to {output_path}", result.data.len());
}
