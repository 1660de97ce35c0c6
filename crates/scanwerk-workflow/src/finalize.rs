// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Finalization: persist the chosen candidate if it only lives in memory, run
// the compression transform, and describe the output. Runs on the blocking
// pool; the orchestrator only ever sees the `FinalizeCompletion`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use scanwerk_bridge::Compressor;
use scanwerk_core::error::{ErrorKind, Result, ScanwerkError, WorkflowError};
use scanwerk_core::types::{
    CandidateKind, CompressParams, Generation, ImageArtifact, ImageFormat, Ownership, RunId,
    ScanResult, is_same_file,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Everything the background task needs; owns no workflow state.
pub(crate) struct FinalizeJob {
    pub run_id: RunId,
    pub generation: Generation,
    pub kind: CandidateKind,
    pub artifact: ImageArtifact,
    pub work_dir: PathBuf,
    pub params: CompressParams,
    pub compressor: Arc<dyn Compressor>,
}

/// Completion notification sent back to the orchestrator.
#[derive(Debug)]
pub struct FinalizeCompletion {
    /// Generation the job was started under.
    pub generation: Generation,
    pub outcome: std::result::Result<ScanResult, WorkflowError>,
}

/// Run `job` on the blocking pool and report through `tx`.
pub(crate) fn spawn(runtime: &Handle, job: FinalizeJob, tx: mpsc::UnboundedSender<FinalizeCompletion>) {
    let generation = job.generation;
    runtime.spawn(async move {
        let outcome = match tokio::task::spawn_blocking(move || run(job)).await {
            Ok(outcome) => outcome,
            Err(err) => Err(WorkflowError::with_detail(
                ErrorKind::CompressionFailed,
                format!("finalization task did not complete: {err}"),
            )),
        };
        if tx.send(FinalizeCompletion { generation, outcome }).is_err() {
            debug!("Workflow dropped before finalization completed");
        }
    });
}

#[instrument(skip_all, fields(run = %job.run_id, kind = ?job.kind, generation = %job.generation))]
pub(crate) fn run(job: FinalizeJob) -> std::result::Result<ScanResult, WorkflowError> {
    let fail = |err: ScanwerkError| {
        warn!(error = %err, "Finalization failed");
        WorkflowError::from_cause(ErrorKind::CompressionFailed, &err)
    };

    let source = persist(job.kind, &job.artifact, &job.work_dir, job.params.format).map_err(fail)?;
    let output = job.compressor.compress(&source, &job.params).map_err(fail)?;
    if let ImageArtifact::File { path, ownership: Ownership::Caller } = &job.artifact {
        if is_same_file(&output, path) {
            return Err(fail(ScanwerkError::Compression(format!(
                "output would replace caller-owned {}",
                path.display()
            ))));
        }
    }
    let bytes = std::fs::metadata(&output).map_err(|err| fail(err.into()))?.len();

    info!(output = %output.display(), bytes, "Scan finalized");
    Ok(ScanResult {
        run_id: job.run_id,
        output_file: output,
        candidate: job.kind,
        bytes,
        completed_at: Utc::now(),
    })
}

/// Path the compressor should read. Rasters are written to
/// `<work_dir>/<kind>.<ext>`, replacing any stale file of that name.
pub(crate) fn persist(
    kind: CandidateKind,
    artifact: &ImageArtifact,
    work_dir: &Path,
    format: ImageFormat,
) -> Result<PathBuf> {
    let image = match artifact {
        ImageArtifact::File { path, .. } => return Ok(path.clone()),
        ImageArtifact::Raster(image) => image,
    };

    std::fs::create_dir_all(work_dir)?;
    let path = work_dir.join(kind.file_name(format));
    write_raster(image, &path, format)?;
    debug!(path = %path.display(), "Raster candidate persisted");
    Ok(path)
}

fn write_raster(image: &DynamicImage, path: &Path, format: ImageFormat) -> Result<()> {
    let encode_err =
        |err: image::ImageError| ScanwerkError::ImageEncode(format!("{}: {err}", path.display()));
    match format {
        // Full quality here; the compressor applies the configured quality.
        ImageFormat::Jpeg => {
            let mut writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(&mut writer, 100);
            image.to_rgb8().write_with_encoder(encoder).map_err(encode_err)?;
            writer.flush()?;
            Ok(())
        }
        ImageFormat::Png | ImageFormat::Webp => DynamicImage::ImageRgba8(image.to_rgba8())
            .save_with_format(path, format.codec())
            .map_err(encode_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct CopyCompressor;

    impl Compressor for CopyCompressor {
        fn compress(&self, input: &Path, params: &CompressParams) -> Result<PathBuf> {
            let out = input.with_file_name(format!("out.{}", params.format.extension()));
            std::fs::copy(input, &out)?;
            Ok(out)
        }
    }

    struct FailingCompressor;

    impl Compressor for FailingCompressor {
        fn compress(&self, _input: &Path, _params: &CompressParams) -> Result<PathBuf> {
            Err(ScanwerkError::Compression("encoder exploded".into()))
        }
    }

    /// Reports the input as its output.
    struct InPlaceCompressor;

    impl Compressor for InPlaceCompressor {
        fn compress(&self, input: &Path, _params: &CompressParams) -> Result<PathBuf> {
            Ok(input.to_path_buf())
        }
    }

    fn job(dir: &Path, artifact: ImageArtifact, compressor: Arc<dyn Compressor>) -> FinalizeJob {
        FinalizeJob {
            run_id: RunId::new(),
            generation: Generation(3),
            kind: CandidateKind::Cropped,
            artifact,
            work_dir: dir.to_path_buf(),
            params: CompressParams {
                quality: 80,
                format: ImageFormat::Jpeg,
                max_size: None,
            },
            compressor,
        }
    }

    fn raster() -> ImageArtifact {
        ImageArtifact::raster(DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([9, 99, 199]))))
    }

    #[test]
    fn rasters_are_persisted_under_their_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stale = dir.path().join("cropped.jpg");
        std::fs::write(&stale, b"stale").expect("write");

        let path = persist(CandidateKind::Cropped, &raster(), dir.path(), ImageFormat::Jpeg)
            .expect("persist");
        assert_eq!(path, stale);
        assert_eq!(image::image_dimensions(&path).expect("decode"), (8, 8));
    }

    #[test]
    fn files_are_used_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = ImageArtifact::caller_file("/photos/receipt.png");
        let path = persist(CandidateKind::Original, &artifact, dir.path(), ImageFormat::Png)
            .expect("persist");
        assert_eq!(path, PathBuf::from("/photos/receipt.png"));
    }

    #[test]
    fn successful_run_describes_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = run(job(dir.path(), raster(), Arc::new(CopyCompressor))).expect("run");
        assert_eq!(result.output_file, dir.path().join("out.jpg"));
        assert_eq!(result.candidate, CandidateKind::Cropped);
        assert!(result.bytes > 0);
    }

    #[test]
    fn output_onto_caller_file_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let picked = dir.path().join("receipt.jpg");
        std::fs::write(&picked, b"caller bytes").expect("write");

        let mut job = job(dir.path(), ImageArtifact::caller_file(&picked), Arc::new(InPlaceCompressor));
        job.kind = CandidateKind::Original;
        let err = run(job).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CompressionFailed);
        assert!(err.detail.as_deref().unwrap_or_default().contains("caller-owned"));
        assert_eq!(std::fs::read(&picked).expect("read"), b"caller bytes");
    }

    #[test]
    fn compressor_failure_becomes_compression_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run(job(dir.path(), raster(), Arc::new(FailingCompressor))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CompressionFailed);
        assert!(err.detail.as_deref().unwrap_or_default().contains("encoder exploded"));
    }
}
