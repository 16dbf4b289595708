//! `paddock snapshot`: capture a still and write it to disk.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use paddock_core::{SnapshotImage, StreamTier};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct Saved {
    camera: String,
    quality: StreamTier,
    path: PathBuf,
    bytes: usize,
    content_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    captured_at: DateTime<Utc>,
}

fn extension(content_type: Option<&str>) -> &'static str {
    match content_type.map(str::to_ascii_lowercase).as_deref() {
        Some("image/png") => "png",
        Some("image/jpeg" | "image/jpg") => "jpg",
        _ => "bin",
    }
}

fn default_path(image: &SnapshotImage) -> PathBuf {
    PathBuf::from(format!(
        "{}-{}.{}",
        image.device_id,
        image.tier,
        extension(image.content_type.as_deref())
    ))
}

fn detail(saved: &Saved) -> String {
    let dims = match (saved.width, saved.height) {
        (Some(w), Some(h)) => format!("{w}x{h}"),
        _ => "unknown".into(),
    };
    [
        format!("Camera:   {}", saved.camera),
        format!("Quality:  {}", saved.quality),
        format!("Saved to: {}", saved.path.display()),
        format!("Size:     {} bytes", saved.bytes),
        format!("Type:     {}", saved.content_type.as_deref().unwrap_or("-")),
        format!("Pixels:   {dims}"),
        format!("Taken:    {}", saved.captured_at.to_rfc3339()),
    ]
    .join("\n")
}

pub async fn handle(args: SnapshotArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (manager, device) = util::connect_one(global, &args.camera).await?;
    let captured = manager
        .capture_snapshot(&device.id, util::tier(args.quality))
        .await;
    manager.shutdown().await;
    let image = captured?;

    let path = args.output.unwrap_or_else(|| default_path(&image));
    tokio::fs::write(&path, &image.data).await?;

    let saved = Saved {
        camera: image.device_id.to_string(),
        quality: image.tier,
        path,
        bytes: image.data.len(),
        content_type: image.content_type,
        width: image.width,
        height: image.height,
        captured_at: image.captured_at,
    };
    let out = output::render_single(global.format, &saved, detail, |s| {
        s.path.display().to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(extension(Some("image/png")), "png");
        assert_eq!(extension(Some("IMAGE/JPEG")), "jpg");
        assert_eq!(extension(None), "bin");
    }
}
