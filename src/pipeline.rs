//! Export orchestration.
//!
//! One export owns one surface for its whole lifetime: mount, stabilize,
//! reveal, then per-section readiness and capture in strict canonical order,
//! and finally page assembly. The surface is unmounted exactly once on every
//! exit path, success or failure.

use crate::assemble::assemble_pages;
use crate::config::{ExportConfig, ExportOptions, validate_export_config};
use crate::content::ExamContent;
use crate::debug::DebugLogger;
use crate::document::build_document;
use crate::error::ExportError;
use crate::font::FontBook;
use crate::pdf::write_pdf;
use crate::settle::SettleOutcome;
use crate::surface::{Raster, RenderSurface};

/// Producer string stamped into the info dictionary of every export.
pub(crate) const PRODUCER: &str = "Offprint";

pub(crate) async fn run_export<S: RenderSurface>(
    surface: &mut S,
    config: &ExportConfig,
    fonts: &FontBook,
    debug: Option<&DebugLogger>,
    content: &ExamContent,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    validate_export_config(config)?;

    let document = build_document(content, options, &config.product_label);

    if let Some(logger) = debug {
        let sections = document.included_count().to_string();
        logger.event(
            "export.begin",
            &[
                ("kind", content.metadata.kind_code.as_str()),
                ("sections", sections.as_str()),
            ],
        );
    }

    let result = match surface.mount(&document).await {
        Ok(()) => capture_document(surface, config, fonts, debug).await,
        Err(err) => Err(err),
    };
    surface.unmount().await;

    if let Some(logger) = debug {
        match &result {
            Ok(bytes) => {
                let size = bytes.len().to_string();
                logger.event("export.finish", &[("bytes", size.as_str())]);
            }
            Err(err) => {
                let message = err.to_string();
                logger.event("export.finish", &[("error", message.as_str())]);
            }
        }
        logger.emit_summary("export");
        logger.flush();
    }

    result
}

async fn capture_document<S: RenderSurface>(
    surface: &mut S,
    config: &ExportConfig,
    fonts: &FontBook,
    debug: Option<&DebugLogger>,
) -> Result<Vec<u8>, ExportError> {
    for name in fonts.verify_faces() {
        eprintln!("[offprint] font failed verification: {name}");
        if let Some(logger) = debug {
            logger.increment("font.preload_failed", 1);
        }
    }

    let outcome = surface.stabilize().await;
    if let Some(logger) = debug {
        let label = match outcome {
            SettleOutcome::Quiet => "quiet",
            SettleOutcome::BudgetExhausted => "budget_exhausted",
        };
        logger.event("surface.settle", &[("outcome", label)]);
    }
    if outcome == SettleOutcome::BudgetExhausted {
        eprintln!("[offprint] settle budget exhausted before quiescence");
        if let Some(logger) = debug {
            logger.increment("surface.settle_budget_exhausted", 1);
        }
    }

    surface.reveal().await;

    let targets = surface.capture_targets();
    let mut rasters: Vec<Raster> = Vec::with_capacity(targets.len());
    for key in &targets {
        let key = key.as_str();
        let readiness = surface.prepare_section(key).await;
        if readiness.resolved > 0 {
            if let Some(logger) = debug {
                let count = readiness.resolved.to_string();
                logger.event(
                    "image.resolved",
                    &[("section", key), ("count", count.as_str())],
                );
            }
        }
        for failure in &readiness.failures {
            eprintln!("[offprint] image readiness failed in {key}: {failure}");
            if let Some(logger) = debug {
                logger.event(
                    "image.readiness_failed",
                    &[("section", key), ("source", failure.as_str())],
                );
                logger.increment("image.readiness_failed", 1);
            }
        }

        let raster = surface.capture_section(key).await?;
        if let Some(logger) = debug {
            let width = raster.width_px.to_string();
            let height = raster.height_px.to_string();
            logger.event(
                "section.captured",
                &[
                    ("section", key),
                    ("width_px", width.as_str()),
                    ("height_px", height.as_str()),
                ],
            );
        }
        rasters.push(raster);
    }

    let pages = assemble_pages(&rasters, &config.geometry(), config.jpeg_quality)?;
    if let Some(logger) = debug {
        for (index, page) in pages.iter().enumerate() {
            let number = (index + 1).to_string();
            let width = format!("{:.3}", page.plan.image.width.to_f32());
            let height = format!("{:.3}", page.plan.image.height.to_f32());
            logger.event(
                "page.assembled",
                &[
                    ("page", number.as_str()),
                    ("width_mm", width.as_str()),
                    ("height_mm", height.as_str()),
                ],
            );
        }
    }

    Ok(write_pdf(&pages, PRODUCER))
}
