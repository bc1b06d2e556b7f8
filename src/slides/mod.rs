//! Slide Deck Assembly
//!
//! Fills a Google Slides template with one section per metric:
//!
//! 1. Copy the template and move the copy into the configured folder
//! 2. Upload each chart PNG to Drive and make it publicly readable
//! 3. Replace `{{<slug>_title}}` / `{{<slug>_paragraph}}` text tokens and the
//!    `{{<slug>_chart}}` shape with the uploaded image
//! 4. Optionally export the finished deck as PDF
//!
//! Folder moves, permission grants and PDF export are best effort.

mod auth;
mod google;
mod slug;

pub use auth::{
    ServiceAccountKey, ServiceAccountTokenSource, SharedTokenSource, StaticTokenSource,
    TokenSource, create_token_source,
};
pub use google::GoogleClient;
pub use slug::{chart_token, paragraph_token, slugify, title_token};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::DeckConfig;
use crate::constants::google::{PRESENTATION_PREFIX, PUBLIC_IMAGE_URL};
use crate::types::{DeckError, Result};

/// One metric's slide content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckSection {
    pub title: String,
    pub paragraph: Option<String>,
    pub chart_path: Option<PathBuf>,
}

impl DeckSection {
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }

    fn is_renderable(&self) -> bool {
        self.chart_path.is_some()
            && self
                .paragraph
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub title: String,
    pub file_id: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckOutput {
    pub presentation_id: String,
    pub pdf_path: Option<PathBuf>,
    pub uploaded_images: Vec<UploadedImage>,
}

#[async_trait]
pub trait DeckAssembler: Send + Sync {
    async fn assemble(&self, sections: &[DeckSection]) -> Result<DeckOutput>;
}

pub type SharedAssembler = Arc<dyn DeckAssembler + Send + Sync>;

/// Drive + Slides backed assembler
pub struct GoogleSlidesAssembler {
    client: GoogleClient,
    template_id: String,
    folder_id: Option<String>,
    export_pdf: bool,
    pdf_dir: PathBuf,
}

impl GoogleSlidesAssembler {
    pub fn new(client: GoogleClient, config: &DeckConfig) -> Result<Self> {
        let template_id = config
            .template_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| DeckError::Config("deck.template_id is required".to_string()))?;

        Ok(Self {
            client,
            template_id,
            folder_id: config.folder_id.clone(),
            export_pdf: config.export_pdf,
            pdf_dir: config.pdf_dir.clone(),
        })
    }

    /// Token source and REST client from deck configuration
    pub fn from_config(config: &DeckConfig, timeout: std::time::Duration) -> Result<Self> {
        let tokens = create_token_source(config)?;
        Self::new(GoogleClient::new(config, tokens, timeout)?, config)
    }

    async fn upload_chart(&self, section: &DeckSection, path: &std::path::Path) -> Result<UploadedImage> {
        let bytes = tokio::fs::read(path).await?;
        let file_id = self
            .client
            .upload_png(bytes, &format!("{}_chart", section.slug()), self.folder_id.as_deref())
            .await?;

        if let Err(e) = self.client.make_public(&file_id).await {
            warn!(file_id = %file_id, "Could not make chart public: {}", e);
        }

        Ok(UploadedImage {
            title: section.title.clone(),
            image_url: PUBLIC_IMAGE_URL.replace("{id}", &file_id),
            file_id,
        })
    }

    async fn export_pdf(&self, presentation_id: &str) -> Option<PathBuf> {
        let result = async {
            let bytes = self.client.export(presentation_id, "application/pdf").await?;
            tokio::fs::create_dir_all(&self.pdf_dir).await?;
            let path = self.pdf_dir.join(format!("{}.pdf", presentation_id));
            tokio::fs::write(&path, bytes).await?;
            Ok::<_, DeckError>(path)
        }
        .await;

        match result {
            Ok(path) => {
                info!("Exported PDF to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("PDF export failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl DeckAssembler for GoogleSlidesAssembler {
    #[instrument(skip_all, fields(sections = sections.len()))]
    async fn assemble(&self, sections: &[DeckSection]) -> Result<DeckOutput> {
        let renderable: Vec<&DeckSection> = sections
            .iter()
            .filter(|s| {
                let keep = s.is_renderable();
                if !keep {
                    debug!("Skipping section '{}' (missing paragraph or chart)", s.title);
                }
                keep
            })
            .collect();
        if renderable.is_empty() {
            return Err(DeckError::Deck(
                "No renderable sections (need both paragraph and chart)".to_string(),
            ));
        }

        let name = format!(
            "{}_{}",
            PRESENTATION_PREFIX,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let presentation_id = self.client.copy_file(&self.template_id, &name).await?;
        info!("Copied template to '{}' ({})", name, presentation_id);

        if let Some(folder) = &self.folder_id
            && let Err(e) = self.client.move_file(&presentation_id, folder).await
        {
            warn!("Could not move presentation into folder {}: {}", folder, e);
        }

        let mut uploaded_images = Vec::with_capacity(renderable.len());
        for section in &renderable {
            if let Some(path) = &section.chart_path {
                uploaded_images.push(self.upload_chart(section, path).await?);
            }
        }

        let requests = replacement_requests(&renderable, &uploaded_images);
        self.client
            .batch_update(&presentation_id, requests)
            .await?;
        info!(
            "Filled {} sections in presentation {}",
            renderable.len(),
            presentation_id
        );

        let pdf_path = if self.export_pdf {
            self.export_pdf(&presentation_id).await
        } else {
            None
        };

        Ok(DeckOutput {
            presentation_id,
            pdf_path,
            uploaded_images,
        })
    }
}

/// Text replacements first, then image replacements
fn replacement_requests(sections: &[&DeckSection], images: &[UploadedImage]) -> Vec<Value> {
    let mut requests = Vec::with_capacity(sections.len() * 3);

    for section in sections {
        let slug = section.slug();
        requests.push(replace_text(&title_token(&slug), &section.title));
        requests.push(replace_text(
            &paragraph_token(&slug),
            section.paragraph.as_deref().unwrap_or_default(),
        ));
    }

    for (section, image) in sections.iter().zip(images) {
        requests.push(json!({
            "replaceAllShapesWithImage": {
                "imageUrl": image.image_url,
                "imageReplaceMethod": "CENTER_INSIDE",
                "containsText": {"text": chart_token(&section.slug()), "matchCase": true}
            }
        }));
    }

    requests
}

fn replace_text(token: &str, value: &str) -> Value {
    json!({
        "replaceAllText": {
            "containsText": {"text": token, "matchCase": true},
            "replaceText": value
        }
    })
}
