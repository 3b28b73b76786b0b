use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use crate::error::IndexError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Write access to one search index core.
///
/// Implementations must upsert by document key so that sending the same
/// artifact twice doesn't duplicate entries.
pub trait IndexClient: Send + Sync {
    /// Sends an index-format artifact. Returns the server's response text.
    fn update(&self, artifact: &Path) -> Result<String, IndexError>;

    /// Removes every document belonging to the institution.
    fn delete_institution(&self, institution_id: &str) -> Result<(), IndexError>;
}

/// Client for a Solr core's XML update handler.
pub struct SolrClient {
    core: String,
    update_url: String,
    institution_field: String,
    http: Client,
}

impl SolrClient {
    pub fn new(core: &str, core_url: &str, institution_field: &str) -> Result<Self, IndexError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            core: core.to_string(),
            update_url: format!("{}/update?commit=true", core_url.trim_end_matches('/')),
            institution_field: institution_field.to_string(),
            http,
        })
    }

    pub fn update_url(&self) -> &str {
        &self.update_url
    }

    fn post_xml(&self, body: Vec<u8>) -> Result<String, IndexError> {
        let response = self
            .http
            .post(&self.update_url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(IndexError::Rejected {
                core: self.core.clone(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

/// Delete-by-query body matching every document of an institution.
pub fn delete_query_body(institution_field: &str, institution_id: &str) -> String {
    format!(
        "<delete><query>{}:\"{}\"</query></delete>",
        quick_xml::escape::escape(institution_field),
        quick_xml::escape::escape(institution_id)
    )
}

impl IndexClient for SolrClient {
    fn update(&self, artifact: &Path) -> Result<String, IndexError> {
        let body = std::fs::read(artifact).map_err(|e| IndexError::ReadArtifact {
            path: artifact.to_path_buf(),
            source: e,
        })?;
        self.post_xml(body)
    }

    fn delete_institution(&self, institution_id: &str) -> Result<(), IndexError> {
        self.post_xml(delete_query_body(&self.institution_field, institution_id).into_bytes())
            .map(|_| ())
    }
}
