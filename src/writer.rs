use crate::config::AppConfig;
use crate::descriptor::{Descriptor, GeoPoint};
use crate::error::AppError;
use chrono::{Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Raw,
    Gif,
    Video,
    LegacyVideo,
    Unsupported,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" => MediaKind::Photo,
            "nef" => MediaKind::Raw,
            "gif" => MediaKind::Gif,
            "mp4" | "mov" => MediaKind::Video,
            "wmv" | "avi" | "mpg" | "3gp" => MediaKind::LegacyVideo,
            _ => MediaKind::Unsupported,
        }
    }
}

/// Result of a successful [`MetadataWriter::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Where the media now lives; differs from the input after a conversion.
    pub path: PathBuf,
    /// False when the format carries no metadata and the file was left as is.
    pub tagged: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct TagSet {
    taken: Option<i64>,
    geo: Option<GeoPoint>,
    description: Option<String>,
}

impl TagSet {
    fn new(descriptor: Option<&Descriptor>, fallback_timestamp: Option<i64>) -> Self {
        TagSet {
            taken: descriptor
                .and_then(|d| d.capture_timestamp)
                .or(fallback_timestamp),
            geo: descriptor.and_then(|d| d.geo),
            description: descriptor.and_then(|d| d.description.clone()),
        }
    }
}

fn local_time(timestamp: i64, format: &str) -> Option<String> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format(format).to_string())
}

/// EXIF/QuickTime date string in local time.
pub fn exif_datetime(timestamp: i64) -> Option<String> {
    local_time(timestamp, "%Y:%m:%d %H:%M:%S")
}

fn ffmpeg_datetime(timestamp: i64) -> Option<String> {
    local_time(timestamp, "%Y-%m-%d %H:%M:%S")
}

fn photo_tag_args(tags: &TagSet) -> Vec<String> {
    // Thumbnails are dropped so the rewritten EXIF block stays within size limits.
    let mut args = vec![
        "-overwrite_original".to_string(),
        "-ThumbnailImage=".to_string(),
        "-PreviewImage=".to_string(),
    ];
    if let Some(taken) = tags.taken.and_then(exif_datetime) {
        args.push(format!("-DateTimeOriginal={}", taken));
        args.push(format!("-ModifyDate={}", taken));
    }
    if let Some(geo) = tags.geo {
        let lat_ref = if geo.latitude < 0.0 { "S" } else { "N" };
        let lon_ref = if geo.longitude < 0.0 { "W" } else { "E" };
        args.push(format!("-GPSLatitude={}", geo.latitude.abs()));
        args.push(format!("-GPSLatitudeRef={}", lat_ref));
        args.push(format!("-GPSLongitude={}", geo.longitude.abs()));
        args.push(format!("-GPSLongitudeRef={}", lon_ref));
    }
    if let Some(description) = &tags.description {
        args.push(format!("-ImageDescription={}", description));
    }
    args
}

fn video_tag_args(tags: &TagSet) -> Vec<String> {
    let mut args = vec!["-overwrite_original".to_string()];
    if let Some(taken) = tags.taken.and_then(exif_datetime) {
        for tag in ["CreateDate", "TrackCreateDate", "MediaCreateDate"] {
            args.push(format!("-{}={}", tag, taken));
        }
    }
    if let Some(description) = &tags.description {
        args.push(format!("-Title={}", description));
        args.push(format!("-Description={}", description));
    }
    args
}

fn ffmpeg_args(input: &Path, output: &Path, tags: &TagSet) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-f".to_string(),
        "mp4".to_string(),
        "-vcodec".to_string(),
        "libx264".to_string(),
        "-acodec".to_string(),
        "aac".to_string(),
    ];
    if let Some(taken) = tags.taken.and_then(ffmpeg_datetime) {
        args.push("-metadata".to_string());
        args.push(format!("creation_time={}", taken));
    }
    if let Some(description) = &tags.description {
        args.push("-metadata".to_string());
        args.push(format!("comment={}", description));
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Embeds descriptor metadata into media files with `exiftool`, converting
/// legacy formats with `ffmpeg`.
pub struct MetadataWriter {
    exiftool: String,
    ffmpeg: String,
}

impl MetadataWriter {
    pub fn new(exiftool: impl Into<String>, ffmpeg: impl Into<String>) -> Self {
        Self {
            exiftool: exiftool.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.exiftool_path.clone(), config.ffmpeg_path.clone())
    }

    pub fn check_tools(&self) -> Result<(), AppError> {
        let version = run_tool(&self.exiftool, &["-ver"])?;
        log::info!(
            "Using exiftool {}",
            String::from_utf8_lossy(&version).trim()
        );
        run_tool(&self.ffmpeg, &["-version"])?;
        Ok(())
    }

    /// Writes capture time, location and description into `media_path`.
    /// `fallback_timestamp` is used when the descriptor has no capture time.
    pub fn apply(
        &self,
        media_path: &Path,
        descriptor: Option<&Descriptor>,
        fallback_timestamp: Option<i64>,
    ) -> Result<Applied, AppError> {
        let tags = TagSet::new(descriptor, fallback_timestamp);
        match MediaKind::from_path(media_path) {
            MediaKind::Photo => self.update_photo(media_path, &tags),
            MediaKind::Raw => self.convert_raw(media_path, &tags),
            MediaKind::Gif => {
                log::warn!("GIF metadata not supported, keeping {:?} as is", media_path);
                Ok(Applied {
                    path: media_path.to_path_buf(),
                    tagged: false,
                })
            }
            MediaKind::Video => self.update_video(media_path, &tags),
            MediaKind::LegacyVideo => self.convert_legacy_video(media_path, &tags),
            MediaKind::Unsupported => Err(AppError::Unsupported(media_path.to_path_buf())),
        }
    }

    fn update_photo(&self, path: &Path, tags: &TagSet) -> Result<Applied, AppError> {
        log::info!("Processing photo: {:?}", path);
        if tags.taken.is_none() {
            return Err(AppError::MissingTimestamp(path.to_path_buf()));
        }
        // Truncated files make exiftool rewrite garbage.
        let (width, height) = image::image_dimensions(path)?;
        log::trace!("Dimensions for {:?}: {}x{}", path, width, height);

        let mut args = photo_tag_args(tags);
        args.push(path.to_string_lossy().into_owned());
        run_tool(&self.exiftool, &args)?;

        log::info!("Successfully updated metadata for photo: {:?}", path);
        Ok(Applied {
            path: path.to_path_buf(),
            tagged: true,
        })
    }

    fn convert_raw(&self, path: &Path, tags: &TagSet) -> Result<Applied, AppError> {
        log::info!("Converting raw file to JPEG: {:?}", path);
        if tags.taken.is_none() {
            return Err(AppError::MissingTimestamp(path.to_path_buf()));
        }
        let jpg_path = path.with_extension("jpg");
        if jpg_path.exists() {
            return Err(AppError::Generic(format!(
                "conversion target {:?} already exists",
                jpg_path
            )));
        }

        let path_arg = path.to_string_lossy().into_owned();
        let preview = run_tool(&self.exiftool, &["-b", "-JpgFromRaw", path_arg.as_str()])?;
        if preview.is_empty() {
            return Err(AppError::Tool {
                tool: self.exiftool.clone(),
                message: format!("no embedded JPEG in {:?}", path),
            });
        }
        fs::write(&jpg_path, preview)?;

        match self.update_photo(&jpg_path, tags) {
            Ok(applied) => {
                fs::remove_file(path)?;
                log::info!("Successfully converted {:?} to {:?}", path, jpg_path);
                Ok(applied)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&jpg_path) {
                    log::warn!("Could not remove partial {:?}: {}", jpg_path, cleanup);
                }
                Err(e)
            }
        }
    }

    fn update_video(&self, path: &Path, tags: &TagSet) -> Result<Applied, AppError> {
        log::info!("Processing video: {:?}", path);
        if tags.taken.is_none() {
            log::warn!("No timestamp found in metadata for: {:?}", path);
        }
        let mut args = video_tag_args(tags);
        args.push(path.to_string_lossy().into_owned());
        run_tool(&self.exiftool, &args)?;

        log::info!("Successfully updated metadata for video: {:?}", path);
        Ok(Applied {
            path: path.to_path_buf(),
            tagged: true,
        })
    }

    fn convert_legacy_video(&self, path: &Path, tags: &TagSet) -> Result<Applied, AppError> {
        log::info!("Converting video to MP4: {:?}", path);
        let mp4_path = path.with_extension("mp4");
        if mp4_path.exists() {
            return Err(AppError::Generic(format!(
                "conversion target {:?} already exists",
                mp4_path
            )));
        }

        let args = ffmpeg_args(path, &mp4_path, tags);
        log::debug!("ffmpeg arguments: {:?}", args);
        if let Err(e) = run_tool(&self.ffmpeg, &args) {
            if mp4_path.exists() {
                if let Err(cleanup) = fs::remove_file(&mp4_path) {
                    log::warn!("Could not remove partial {:?}: {}", mp4_path, cleanup);
                }
            }
            return Err(e);
        }

        // Nothing may survive a failed pass except the original.
        if let Err(e) = self.finish_conversion(path, &mp4_path, tags) {
            if let Err(cleanup) = fs::remove_file(&mp4_path) {
                log::warn!("Could not remove partial {:?}: {}", mp4_path, cleanup);
            }
            return Err(e);
        }
        log::info!("Converted {:?} -> {:?}", path, mp4_path);
        Ok(Applied {
            path: mp4_path,
            tagged: true,
        })
    }

    fn finish_conversion(&self, original: &Path, mp4_path: &Path, tags: &TagSet) -> Result<(), AppError> {
        // ffmpeg's creation_time does not reach every QuickTime date tag.
        if tags.taken.is_some() {
            let mut args = video_tag_args(&TagSet {
                description: None,
                ..tags.clone()
            });
            args.push(mp4_path.to_string_lossy().into_owned());
            run_tool(&self.exiftool, &args)?;
        }
        fs::remove_file(original)?;
        Ok(())
    }
}

fn run_tool<S: AsRef<str>>(program: &str, args: &[S]) -> Result<Vec<u8>, AppError> {
    let output = Command::new(program)
        .args(args.iter().map(|a| a.as_ref()))
        .output()
        .map_err(|e| AppError::Tool {
            tool: program.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(AppError::Tool {
            tool: program.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}
