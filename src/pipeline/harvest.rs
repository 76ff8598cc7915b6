//! Supplementary-material harvesting from a rendered publisher page.
//!
//! Harvesting is best-effort end to end: a failure in one rule or one element
//! is logged and must not prevent the remaining rules and elements from being
//! evaluated, and nothing in this module can fail the record.
//!
//! ## The trigger wait is not a completion guarantee
//!
//! Trigger rules click a control whose download happens inside the browser,
//! invisibly to this process. The only mitigation is a fixed settle delay per
//! activation (`trigger_settle_ms`). A slow download can outlive the wait and
//! the file will be missing from the scratch area; that is an accepted
//! reliability gap, not a bug to paper over with polling that has nothing to
//! poll.

use crate::config::HarvestConfig;
use crate::error::StageError;
use crate::patterns::{ActionKind, ExtractionRule};
use crate::render::PageSession;
use crate::scratch::ScratchArea;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Drive `session` over all `rules`, fetching files into `scratch`.
///
/// Returns the number of files fetched via direct links. Trigger activations
/// are logged but uncounted — their downloads are unobservable.
pub async fn harvest(
    session: &dyn PageSession,
    rules: &[ExtractionRule],
    scratch: &ScratchArea,
    http: &reqwest::Client,
    config: &HarvestConfig,
) -> usize {
    // Bounded idle-scroll sequence to force lazy content to materialize.
    for pulse in 0..config.scroll_pulses {
        if let Err(e) = session.scroll_to_end().await {
            warn!("scroll pulse {} failed: {e}", pulse + 1);
            break;
        }
        tokio::time::sleep(Duration::from_millis(config.scroll_settle_ms)).await;
    }

    let mut fetched = 0usize;
    for rule in rules {
        let elements = match session.find_elements(&rule.locator).await {
            Ok(els) => els,
            Err(e) => {
                warn!("rule '{}' could not be evaluated: {e}", rule.label);
                continue;
            }
        };
        debug!("rule '{}' matched {} element(s)", rule.label, elements.len());

        for (index, element) in elements.iter().enumerate() {
            let outcome = match rule.action {
                ActionKind::Trigger => {
                    let clicked = session.click(element).await;
                    if clicked.is_ok() {
                        // Download side-effect is asynchronous; best-effort wait.
                        tokio::time::sleep(Duration::from_millis(config.trigger_settle_ms)).await;
                    }
                    clicked
                }
                ActionKind::DirectLink => {
                    match session.attribute(element, "href").await {
                        Ok(Some(href)) => {
                            match fetch_to_scratch(http, &href, scratch.path(), config).await {
                                Ok(()) => {
                                    fetched += 1;
                                    Ok(())
                                }
                                Err(e) => Err(e),
                            }
                        }
                        Ok(None) => {
                            debug!("rule '{}' element {} has no href", rule.label, index + 1);
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            if let Err(e) = outcome {
                warn!(
                    "rule '{}' element {}/{} failed: {e}",
                    rule.label,
                    index + 1,
                    elements.len()
                );
            }
        }
    }

    info!("harvest fetched {fetched} direct-link file(s)");
    fetched
}

/// Stream one URL into the scratch area under the URL path's base name.
async fn fetch_to_scratch(
    http: &reqwest::Client,
    url: &str,
    scratch_dir: &Path,
    config: &HarvestConfig,
) -> Result<(), StageError> {
    let download_err = |detail: String| StageError::Download {
        url: url.to_string(),
        detail,
    };

    let response = http
        .get(url)
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .send()
        .await
        .map_err(|e| download_err(e.to_string()))?;

    if !response.status().is_success() {
        return Err(download_err(format!("HTTP {}", response.status())));
    }

    let filename = base_name(url);
    let target = scratch_dir.join(&filename);
    let mut file = tokio::fs::File::create(&target)
        .await
        .map_err(|e| download_err(format!("create '{}': {e}", target.display())))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| download_err(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| download_err(format!("write '{}': {e}", target.display())))?;
    }
    file.flush()
        .await
        .map_err(|e| download_err(e.to_string()))?;

    info!("downloaded '{filename}' ({url})");
    Ok(())
}

/// Base name of a URL path, without query or fragment. Falls back to a fixed
/// name when the path is bare.
fn base_name(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "download.bin".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_from_url_path() {
        assert_eq!(base_name("https://pub.example/files/supp1.zip"), "supp1.zip");
        assert_eq!(
            base_name("https://pub.example/files/supp1.zip?download=true#top"),
            "supp1.zip"
        );
    }

    #[test]
    fn base_name_falls_back_when_bare() {
        assert_eq!(base_name("https://pub.example/"), "download.bin");
        assert_eq!(base_name("https://pub.example"), "download.bin");
    }
}
