use anyhow::Context as _;

pub const DEFAULT_BIOC_BASE_URL: &str =
    "https://www.ncbi.nlm.nih.gov/research/bionlp/RESTful/pmcoa.cgi/BioC_xml";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PmcIdError {
    #[error("Missing pmcId")]
    Missing,
    #[error("pmcId must contain only ASCII letters and digits")]
    Invalid,
}

/// Trims `raw` and checks it is a bare identifier such as `PMC1234567`.
pub fn validate_pmc_id(raw: &str) -> Result<&str, PmcIdError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(PmcIdError::Missing);
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PmcIdError::Invalid);
    }
    Ok(id)
}

pub fn bioc_xml_url(base_url: &str, pmc_id: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/{pmc_id}/unicode")
}

/// Fetches the BioC XML document for an already validated id.
pub async fn fetch_bioc_xml(
    client: &reqwest::Client,
    base_url: &str,
    pmc_id: &str,
) -> anyhow::Result<String> {
    let url = bioc_xml_url(base_url, pmc_id);
    tracing::debug!(url = %url, "fetching BioC XML");

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;
    response
        .text()
        .await
        .with_context(|| format!("read body: {url}"))
}
