//! Faculty directory crawler.
//!
//! Fetches the faculty listing pages, follows every profile link that stays
//! inside the allowed domain, and extracts one [`RawFacultyRecord`] per
//! profile. Parsing is kept separate from fetching ([`PageParser`]) so it
//! can be exercised against fixture HTML.
//!
//! Field extraction rules:
//! - education degrees are joined with `" | "`
//! - biography paragraphs, teaching and research text with `"\n"`
//! - specialization text with `", "`
//! - each publication list item's text pieces with `" "`, items with `"\n"`
//!
//! Every piece is trimmed and empty pieces are dropped before joining.

use std::collections::HashSet;
use std::time::Duration;

use ::scraper::{ElementRef, Html, Selector};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::RawFacultyRecord;
use crate::provider::{ProviderError, ProviderResult, RecordProvider};

/// Listing pages crawled by default.
pub const DEFAULT_START_URLS: [&str; 5] = [
    "https://www.daiict.ac.in/faculty",
    "https://www.daiict.ac.in/adjunct-faculty",
    "https://www.daiict.ac.in/adjunct-faculty-international",
    "https://www.daiict.ac.in/distinguished-professor",
    "https://www.daiict.ac.in/professor-practice",
];

pub const DEFAULT_ALLOWED_DOMAIN: &str = "daiict.ac.in";

const USER_AGENT: &str = concat!("faculty-finder/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while crawling.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Request failed or returned an error status
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL could not be parsed or joined
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A CSS selector failed to compile
    #[error("Invalid selector '{0}'")]
    Selector(String),

    /// Every listing page failed to load
    #[error("No listing page could be fetched")]
    NoListings,
}

/// Result type for crawl operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Crawl settings.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub start_urls: Vec<String>,

    /// Profile links outside this domain (and its subdomains) are not followed
    pub allowed_domain: String,

    /// Maximum profile pages fetched at once
    pub concurrency: usize,

    pub timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            start_urls: DEFAULT_START_URLS.iter().map(|url| url.to_string()).collect(),
            allowed_domain: DEFAULT_ALLOWED_DOMAIN.to_string(),
            concurrency: 8,
            timeout: Duration::from_secs(30),
        }
    }
}

/// One profile link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Display name from the listing, or "Unknown"
    pub name: String,

    /// Absolute profile URL
    pub profile_url: String,
}

/// Compiled selectors for listing and profile pages.
pub struct PageParser {
    listing_item: Selector,
    listing_link: Selector,
    education: Selector,
    email: Selector,
    phone: Selector,
    address: Selector,
    faculty_web: Selector,
    biography: Selector,
    specialization: Selector,
    teaching: Selector,
    publications: Selector,
    research: Selector,
}

fn compile(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{}: {:?}", css, e)))
}

impl PageParser {
    pub fn new() -> ScrapeResult<Self> {
        Ok(Self {
            listing_item: compile("div.facultyInformation ul li")?,
            listing_link: compile(
                "div.personalDetails h3 a, div.personalDetail h3 a, div.personalsDetails h3 a",
            )?,
            education: compile(
                "div.contact-box-p.pb0.EducationIcon div.detail div.field-content \
                 div.field.field--name-field-faculty-name.field--type-string.field--label-hidden.field__item",
            )?,
            email: compile("div.contact-box-p.emailIcon div.field__item")?,
            phone: compile(
                "div.contact-box-p.pb0.mobileIcon div.detail div.field-content \
                 div.field.field--name-field-contact-no.field--type-string.field--label-hidden.field__item",
            )?,
            address: compile(
                "div.contact-box-p.pb0.addressIcon div.detail div.field-content \
                 div.field.field--name-field-address.field--type-string-long.field--label-hidden.field__item",
            )?,
            faculty_web: compile("div.contact-box-p.facultyweb a")?,
            biography: compile("div.about p")?,
            specialization: compile(r#"div[class="work-exp margin-bottom-20"]"#)?,
            teaching: compile(
                r#"div[class*="work-exp"]:not([class*="margin-bottom-20"]):not([class*="work-exp1"])"#,
            )?,
            publications: compile(
                r#"div[class*="education"][class*="overflowContent"] ul > li, div[class*="education"][class*="overflowContent"] ol > li"#,
            )?,
            research: compile(r#"div[class="work-exp1"]"#)?,
        })
    }

    /// Extract profile links from a listing page.
    ///
    /// Items without a link are skipped. Relative links are resolved
    /// against `base`.
    pub fn parse_listing(&self, html: &str, base: &Url) -> Vec<ListingEntry> {
        let document = Html::parse_document(html);
        let mut entries = Vec::new();

        for item in document.select(&self.listing_item) {
            let Some(href) = item
                .select(&self.listing_link)
                .find_map(|link| link.value().attr("href"))
            else {
                continue;
            };

            let profile_url = match base.join(href) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    warn!("Skipping profile link '{}': {}", href, e);
                    continue;
                }
            };

            let name = item
                .select(&self.listing_link)
                .flat_map(own_text)
                .next()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Unknown".to_string());

            entries.push(ListingEntry { name, profile_url });
        }

        entries
    }

    /// Extract a raw record from a profile page.
    pub fn parse_profile(&self, html: &str, entry: &ListingEntry) -> RawFacultyRecord {
        let document = Html::parse_document(html);

        let publications: Vec<String> = document
            .select(&self.publications)
            .map(|item| clean(item.text()).join(" "))
            .collect();

        let education = clean(document.select(&self.education).flat_map(own_text)).join(" | ");
        let email = document.select(&self.email).flat_map(own_text).next();
        let phone = document.select(&self.phone).flat_map(own_text).next();
        let address = document.select(&self.address).flat_map(own_text).next();
        let faculty_web = document
            .select(&self.faculty_web)
            .find_map(|link| link.value().attr("href"))
            .map(str::to_string);
        let biography = clean(document.select(&self.biography).flat_map(own_text)).join("\n");
        let specialization = clean(descendant_text(&document, &self.specialization)).join(", ");
        let teaching = clean(descendant_text(&document, &self.teaching)).join("\n");
        let research = clean(descendant_text(&document, &self.research)).join("\n");

        RawFacultyRecord {
            name: Some(entry.name.clone()),
            profile_url: Some(entry.profile_url.clone()),
            education: Some(education),
            email,
            phone,
            address,
            faculty_web,
            biography: Some(biography),
            specialization: Some(specialization),
            teaching: Some(teaching),
            publications: Some(clean(publications).join("\n")),
            research: Some(research),
        }
    }
}

/// Text nodes that are direct children of `element`.
fn own_text(element: ElementRef<'_>) -> impl Iterator<Item = String> + '_ {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|text| text.trim().to_string()))
}

/// Every text node under the matched elements, each node at most once even
/// when matches are nested.
fn descendant_text(document: &Html, selector: &Selector) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut pieces = Vec::new();

    for element in document.select(selector) {
        for node in element.descendants() {
            if let Some(text) = node.value().as_text() {
                if seen.insert(node.id()) {
                    pieces.push(text.trim().to_string());
                }
            }
        }
    }

    pieces
}

fn clean<I, T>(pieces: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    pieces
        .into_iter()
        .map(|piece| piece.as_ref().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Whether `url` is on `domain` or one of its subdomains.
pub fn is_allowed(url: &str, domain: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| host == domain || host.ends_with(&format!(".{}", domain)))
}

/// Crawls the faculty directory over HTTP.
pub struct FacultyScraper {
    client: Client,
    config: ScrapeConfig,
    parser: PageParser,
}

impl FacultyScraper {
    pub fn new(config: ScrapeConfig) -> ScrapeResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            parser: PageParser::new()?,
        })
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    async fn fetch_page(&self, url: &str) -> ScrapeResult<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Collect profile links from every listing page.
    ///
    /// Failing listing pages are logged and skipped. Links outside the
    /// allowed domain and repeated profile URLs are dropped.
    ///
    /// # Errors
    /// Returns `ScrapeError::NoListings` if no listing page could be fetched
    pub async fn collect_listing(&self) -> ScrapeResult<Vec<ListingEntry>> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut pages_loaded = 0;

        for start_url in &self.config.start_urls {
            let base = match Url::parse(start_url) {
                Ok(base) => base,
                Err(e) => {
                    warn!("Invalid listing URL '{}': {}", start_url, e);
                    continue;
                }
            };

            let html = match self.fetch_page(start_url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Failed to fetch listing {}: {}", start_url, e);
                    continue;
                }
            };
            pages_loaded += 1;

            let found = self.parser.parse_listing(&html, &base);
            debug!("{} profile links on {}", found.len(), start_url);

            for entry in found {
                if !is_allowed(&entry.profile_url, &self.config.allowed_domain) {
                    debug!("Skipping offsite profile {}", entry.profile_url);
                    continue;
                }
                if seen.insert(entry.profile_url.clone()) {
                    entries.push(entry);
                }
            }
        }

        if pages_loaded == 0 {
            return Err(ScrapeError::NoListings);
        }
        info!("Found {} unique faculty profiles", entries.len());
        Ok(entries)
    }

    /// Fetch and parse every profile, `concurrency` pages at a time.
    ///
    /// `on_done` is called once per entry, whether or not it succeeded.
    /// Records come back in listing order; failed profiles are omitted.
    pub async fn scrape_profiles<F>(&self, entries: &[ListingEntry], on_done: F) -> Vec<RawFacultyRecord>
    where
        F: Fn() + Send + Sync,
    {
        let on_done = &on_done;
        let fetched: Vec<Option<RawFacultyRecord>> = stream::iter(entries.iter().cloned())
            .map(|entry: ListingEntry| async move {
                let result = self.fetch_page(&entry.profile_url).await;
                on_done();
                match result {
                    Ok(html) => Some(self.parser.parse_profile(&html, &entry)),
                    Err(e) => {
                        warn!("Failed to fetch profile {}: {}", entry.profile_url, e);
                        None
                    }
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        fetched.into_iter().flatten().collect()
    }

    /// Crawl listings and profiles.
    ///
    /// # Errors
    /// Returns `ScrapeError::NoListings` if no listing page could be fetched
    pub async fn scrape_all(&self) -> ScrapeResult<Vec<RawFacultyRecord>> {
        let entries = self.collect_listing().await?;
        Ok(self.scrape_profiles(&entries, || {}).await)
    }
}

#[async_trait]
impl RecordProvider for FacultyScraper {
    async fn fetch_records(&self) -> ProviderResult<Vec<RawFacultyRecord>> {
        self.scrape_all()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))
    }

    fn name(&self) -> &str {
        "faculty directory crawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <div class="facultyInformation"><ul>
          <li><div class="personalDetails"><h3><a href="/faculty/arpit-rana"> Arpit Rana </a></h3></div></li>
          <li><div class="personalDetail"><h3><a href="https://www.daiict.ac.in/faculty/priya-shah">Priya Shah</a></h3></div></li>
          <li><div class="personalsDetails"><h3><a href="/faculty/no-name"></a></h3></div></li>
          <li><div class="personalDetails"><h3>No link here</h3></div></li>
        </ul></div>
        </body></html>
    "#;

    const PROFILE: &str = r#"
        <html><body>
        <div class="contact-box-p pb0 EducationIcon"><div class="detail"><div class="field-content">
          <div class="field field--name-field-faculty-name field--type-string field--label-hidden field__item"> PhD (Computer Science), IIT Bombay </div>
          <div class="field field--name-field-faculty-name field--type-string field--label-hidden field__item">M.Tech, IIT Delhi</div>
          <div class="field field--name-field-faculty-name field--type-string field--label-hidden field__item">   </div>
        </div></div></div>
        <div class="contact-box-p emailIcon"><div class="field__item"> arpit_rana@daiict.ac.in </div></div>
        <div class="contact-box-p pb0 mobileIcon"><div class="detail"><div class="field-content">
          <div class="field field--name-field-contact-no field--type-string field--label-hidden field__item">079-68261234</div>
        </div></div></div>
        <div class="contact-box-p pb0 addressIcon"><div class="detail"><div class="field-content">
          <div class="field field--name-field-address field--type-string-long field--label-hidden field__item">Faculty Block 1, Room 2104</div>
        </div></div></div>
        <div class="contact-box-p facultyweb"><a href="https://arpitrana.github.io/">Website</a></div>
        <div class="about"><p> First paragraph. </p><p>Second paragraph.</p><p>  </p></div>
        <div class="work-exp margin-bottom-20"><p>Recommender Systems</p><p> Information Retrieval </p></div>
        <div class="work-exp"><ul><li>IT314 Software Engineering</li><li>IT584 Approximation Algorithms</li></ul></div>
        <div class="work-exp1"><p>Conversational recommenders</p><p>Explainable AI</p></div>
        <div class="education overflowContent">
          <ul><li><b>A. Rana</b>, <i>Paper One</i>, 2021</li><li>Paper Two</li></ul>
          <ol><li>Paper Three</li></ol>
        </div>
        </body></html>
    "#;

    fn entry() -> ListingEntry {
        ListingEntry {
            name: "Arpit Rana".to_string(),
            profile_url: "https://www.daiict.ac.in/faculty/arpit-rana".to_string(),
        }
    }

    #[test]
    fn test_parse_listing_handles_class_variants() {
        let parser = PageParser::new().unwrap();
        let base = Url::parse("https://www.daiict.ac.in/faculty").unwrap();

        let entries = parser.parse_listing(LISTING, &base);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "Arpit Rana");
        assert_eq!(entries[0].profile_url, "https://www.daiict.ac.in/faculty/arpit-rana");
        assert_eq!(entries[1].name, "Priya Shah");
        assert_eq!(entries[2].name, "Unknown");
        assert_eq!(entries[2].profile_url, "https://www.daiict.ac.in/faculty/no-name");
    }

    #[test]
    fn test_parse_profile_extracts_every_field() {
        let parser = PageParser::new().unwrap();
        let record = parser.parse_profile(PROFILE, &entry());

        assert_eq!(record.name.as_deref(), Some("Arpit Rana"));
        assert_eq!(
            record.profile_url.as_deref(),
            Some("https://www.daiict.ac.in/faculty/arpit-rana")
        );
        assert_eq!(
            record.education.as_deref(),
            Some("PhD (Computer Science), IIT Bombay | M.Tech, IIT Delhi")
        );
        assert_eq!(record.email.as_deref(), Some("arpit_rana@daiict.ac.in"));
        assert_eq!(record.phone.as_deref(), Some("079-68261234"));
        assert_eq!(record.address.as_deref(), Some("Faculty Block 1, Room 2104"));
        assert_eq!(record.faculty_web.as_deref(), Some("https://arpitrana.github.io/"));
        assert_eq!(
            record.biography.as_deref(),
            Some("First paragraph.\nSecond paragraph.")
        );
        assert_eq!(
            record.specialization.as_deref(),
            Some("Recommender Systems, Information Retrieval")
        );
        assert_eq!(
            record.teaching.as_deref(),
            Some("IT314 Software Engineering\nIT584 Approximation Algorithms")
        );
        assert_eq!(
            record.research.as_deref(),
            Some("Conversational recommenders\nExplainable AI")
        );
        assert_eq!(
            record.publications.as_deref(),
            Some("A. Rana , Paper One , 2021\nPaper Two\nPaper Three")
        );
    }

    #[test]
    fn test_parse_empty_profile() {
        let parser = PageParser::new().unwrap();
        let record = parser.parse_profile("<html><body></body></html>", &entry());

        assert_eq!(record.email, None);
        assert_eq!(record.phone, None);
        assert_eq!(record.faculty_web, None);
        assert_eq!(record.education.as_deref(), Some(""));
        assert_eq!(record.research.as_deref(), Some(""));
    }

    #[test]
    fn test_is_allowed() {
        assert!(is_allowed("https://www.daiict.ac.in/faculty/x", "daiict.ac.in"));
        assert!(is_allowed("https://daiict.ac.in/faculty/x", "daiict.ac.in"));
        assert!(!is_allowed("https://example.com/faculty/x", "daiict.ac.in"));
        assert!(!is_allowed("https://notdaiict.ac.in/x", "daiict.ac.in"));
        assert!(!is_allowed("not a url", "daiict.ac.in"));
    }

    #[test]
    fn test_default_config_targets_directory() {
        let config = ScrapeConfig::default();
        assert_eq!(config.start_urls.len(), 5);
        assert!(config
            .start_urls
            .iter()
            .all(|url| is_allowed(url, &config.allowed_domain)));
    }

    #[tokio::test]
    async fn test_collect_listing_without_reachable_pages() {
        let scraper = FacultyScraper::new(ScrapeConfig {
            start_urls: vec!["not a url".to_string()],
            ..ScrapeConfig::default()
        })
        .unwrap();

        assert!(matches!(
            scraper.collect_listing().await,
            Err(ScrapeError::NoListings)
        ));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_scrape_profiles_reports_every_entry() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let scraper = FacultyScraper::new(ScrapeConfig {
            concurrency: 2,
            timeout: Duration::from_secs(2),
            ..ScrapeConfig::default()
        })
        .unwrap();
        let entries: Vec<ListingEntry> = (0..3)
            .map(|i| ListingEntry {
                name: format!("Nobody {}", i),
                profile_url: format!("http://127.0.0.1:1/faculty/{}", i),
            })
            .collect();

        let done = AtomicUsize::new(0);
        let profiles = scraper.scrape_profiles(&entries, || {
            done.fetch_add(1, Ordering::SeqCst);
        });
        assert_send(&profiles);
        let records = profiles.await;

        assert!(records.is_empty());
        assert_eq!(done.load(Ordering::SeqCst), 3);

        let provider: &dyn RecordProvider = &scraper;
        assert_send(&provider.fetch_records());
    }
}
