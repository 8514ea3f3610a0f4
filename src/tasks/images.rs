//! Image optimizer task.
//!
//! Per file: skip when the destination is at least as new as the source
//! (incremental filter), otherwise recompress JPEG at the configured
//! quality, optimize PNG via oxipng, minify SVG (attributes untouched, so
//! `viewBox` survives), and copy anything else through. Raster formats
//! additionally get a lossy WebP sibling, which is produced even for
//! skipped sources when it is missing.

use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use image::codecs::jpeg::JpegEncoder;

use crate::config::{ImagesConfig, ResolvedPaths};
use crate::tasks::{ensure_parent, rebase, TaskError};

/// Optimize every file under the image root into the image output
/// directory. Returns the written files.
pub fn optimize(
    paths: &ResolvedPaths,
    config: &ImagesConfig,
    verbose: bool,
) -> Result<Vec<PathBuf>, TaskError> {
    let pattern = format!("{}/**/*", paths.images_dir.display());
    let mut written = Vec::new();
    let mut skipped = 0usize;

    for entry in glob(&pattern)?.flatten() {
        if !entry.is_file() {
            continue;
        }
        let Some(dest) = rebase(&entry, &paths.images_dir, &paths.images_out) else {
            continue;
        };
        ensure_parent(&dest)?;

        let ext = extension_of(&entry);
        let fresh = is_up_to_date(&entry, &dest);

        if fresh {
            skipped += 1;
        } else {
            match ext.as_str() {
                "jpg" | "jpeg" => recompress_jpeg(&entry, &dest, config.jpeg_quality)?,
                "png" => optimize_png(&entry, &dest, config.png_effort)?,
                "svg" => minify_svg(&entry, &dest)?,
                _ => {
                    fs::copy(&entry, &dest)?;
                }
            }
            report(&entry, &dest, verbose);
            written.push(dest.clone());
        }

        // The modern-format derivative must exist even when the optimized
        // original was skipped as unchanged.
        if is_raster(&ext) {
            let webp_dest = dest.with_extension("webp");
            if !fresh || !webp_dest.exists() {
                encode_webp(&entry, &webp_dest, config.webp_quality)?;
                written.push(webp_dest);
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "images unchanged since last build");
    }

    Ok(written)
}

fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase()
}

fn is_raster(ext: &str) -> bool {
    matches!(ext, "jpg" | "jpeg" | "png")
}

/// Incremental filter: destination exists and is at least as new as the
/// source. Metadata errors count as stale.
fn is_up_to_date(src: &Path, dest: &Path) -> bool {
    let src_mtime = fs::metadata(src).and_then(|m| m.modified());
    let dest_mtime = fs::metadata(dest).and_then(|m| m.modified());
    match (src_mtime, dest_mtime) {
        (Ok(s), Ok(d)) => d >= s,
        _ => false,
    }
}

fn recompress_jpeg(src: &Path, dest: &Path, quality: u8) -> Result<(), TaskError> {
    let img = image::open(src)
        .map_err(|e| TaskError::Image { file: src.to_path_buf(), message: e.to_string() })?;
    let mut out = fs::File::create(dest)?;
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| TaskError::Image { file: src.to_path_buf(), message: e.to_string() })?;
    Ok(())
}

fn optimize_png(src: &Path, dest: &Path, effort: u8) -> Result<(), TaskError> {
    let options = oxipng::Options::from_preset(effort);
    oxipng::optimize(
        &oxipng::InFile::Path(src.to_path_buf()),
        &oxipng::OutFile::from_path(dest.to_path_buf()),
        &options,
    )
    .map_err(|e| TaskError::Image { file: src.to_path_buf(), message: e.to_string() })?;
    Ok(())
}

fn minify_svg(src: &Path, dest: &Path) -> Result<(), TaskError> {
    let source = fs::read_to_string(src)?;
    fs::write(dest, minify_svg_text(&source))?;
    Ok(())
}

/// Strip XML comments and collapse whitespace between tags. Tag content
/// and attributes are copied verbatim.
fn minify_svg_text(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    let mut rest = svg;

    // Comments first so their contents cannot confuse the tag scan.
    let mut cleaned = String::with_capacity(svg.len());
    while let Some(start) = rest.find("<!--") {
        cleaned.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => {
                rest = "";
                break;
            }
        }
    }
    cleaned.push_str(rest);

    let mut pending_ws = String::new();
    let mut in_tag = false;
    let mut in_quote: Option<char> = None;
    for c in cleaned.chars() {
        if in_tag {
            out.push(c);
            match (c, in_quote) {
                ('"', None) | ('\'', None) => in_quote = Some(c),
                (q, Some(open)) if q == open => in_quote = None,
                ('>', None) => in_tag = false,
                _ => {}
            }
        } else if c == '<' {
            // Whitespace run ended at a tag boundary: drop it.
            pending_ws.clear();
            out.push(c);
            in_tag = true;
        } else if c.is_whitespace() {
            pending_ws.push(c);
        } else {
            out.push_str(&pending_ws);
            pending_ws.clear();
            out.push(c);
        }
    }
    out
}

fn encode_webp(src: &Path, dest: &Path, quality: u8) -> Result<(), TaskError> {
    let img = image::open(src)
        .map_err(|e| TaskError::Image { file: src.to_path_buf(), message: e.to_string() })?;
    // The webp encoder only takes 8-bit RGB/RGBA frames; grayscale and
    // 16-bit sources must be converted first.
    let img = match img {
        image::DynamicImage::ImageRgb8(_) | image::DynamicImage::ImageRgba8(_) => img,
        other => image::DynamicImage::ImageRgba8(other.to_rgba8()),
    };
    let encoder = webp::Encoder::from_image(&img)
        .map_err(|e| TaskError::Image { file: src.to_path_buf(), message: e.to_string() })?;
    let encoded = encoder.encode(quality as f32);
    fs::write(dest, &*encoded)?;
    Ok(())
}

/// Per-file diagnostics: bytes before/after and percent saved.
fn report(src: &Path, dest: &Path, verbose: bool) {
    let before = fs::metadata(src).map(|m| m.len()).unwrap_or(0);
    let after = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    let saved = if before > after && before > 0 {
        (before - after) * 100 / before
    } else {
        0
    };
    let name = src.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    if verbose {
        println!("  {} {} -> {} ({}% saved)", name, format_bytes(before), format_bytes(after), saved);
    } else {
        tracing::debug!(file = %name, before, after, saved, "optimized");
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} kB", bytes as f64 / 1024.0)
    }
}
