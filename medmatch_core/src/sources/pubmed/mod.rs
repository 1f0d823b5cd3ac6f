//! PubMed (NCBI E-utilities): experts from article authors, and
//! publication search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::SourceSettings;
use crate::error::MatchError;
use crate::record::{normalize_key, RecordKind, SearchableRecord, Source};
use crate::utils::{check_status, clean_html_entities, http_client, truncate_snippet};
use crate::{RecordSource, SearchRequest};

mod parse;
pub use parse::{parse_efetch, parse_esearch_ids, PubMedArticle, PubMedAuthor};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Authors taken from each article.
const AUTHORS_PER_ARTICLE: usize = 2;

const FALLBACK_INSTITUTION: &str = "External Research Institution";

/// Default number of publications returned by a publication search.
pub const DEFAULT_PUBLICATION_LIMIT: usize = 5;

const AUTHORS_PER_PUBLICATION: usize = 3;
const PUBLICATION_ABSTRACT_CHARS: usize = 300;

/// A publication as returned by [`PubMedSource::search_publications`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    pub title: String,
    pub journal: String,
    pub authors: Vec<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// Publications plus whether they came from the built-in fallback list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationSearch {
    pub query: String,
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Publication registry (NCBI E-utilities). Produces experts from the
/// leading authors of matching articles.
#[derive(Clone)]
pub struct PubMedSource {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl PubMedSource {
    pub fn new(settings: &SourceSettings) -> Result<Self, MatchError> {
        Ok(Self {
            client: http_client()?,
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: EUTILS_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search_ids(&self, query: String, limit: usize) -> Result<Vec<String>, MatchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".into()),
            ("term", query),
            ("retmax", (limit * 2).to_string()),
            ("retmode", "json".into()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let response = self
            .client
            .get(format!("{}/esearch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await?;
        let body: Value = check_status("pubmed", response)?.json().await?;
        Ok(parse_esearch_ids(&body))
    }

    async fn fetch_articles(&self, ids: &[String]) -> Result<Vec<PubMedArticle>, MatchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".into()),
            ("id", ids.join(",")),
            ("retmode", "xml".into()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let response = self
            .client
            .get(format!("{}/efetch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await?;
        let xml = check_status("pubmed", response)?.text().await?;
        parse_efetch(&xml)
    }

    /// Articles matching `term` anywhere, at most `limit` distinct titles.
    pub async fn search_publications(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Publication>, MatchError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(MatchError::InvalidInput("Search term is required".into()));
        }
        let ids = self.search_ids(term.to_string(), limit).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.into_iter().take(limit).collect();
        let articles = self.fetch_articles(&ids).await?;
        debug!(term, articles = articles.len(), "pubmed: publications fetched");
        Ok(publications_from_articles(term, &articles, limit))
    }

    /// [`search_publications`](Self::search_publications), falling back to
    /// the built-in list when nothing is found or the registry fails.
    pub async fn publications_or_fallback(&self, term: &str, limit: usize) -> PublicationSearch {
        let result = self.search_publications(term, limit).await;
        resolve_publications(term, result)
    }
}

/// Normalize parsed articles into publications. Titles are entity-decoded
/// and a title seen before (case-insensitive) is skipped.
pub fn publications_from_articles(
    term: &str,
    articles: &[PubMedArticle],
    limit: usize,
) -> Vec<Publication> {
    let mut seen = HashSet::new();
    let mut publications = Vec::new();
    for (i, article) in articles.iter().enumerate() {
        if publications.len() >= limit {
            break;
        }
        let title = if article.title.is_empty() {
            format!("{} Research Study", term)
        } else {
            clean_html_entities(&article.title)
        };
        if !seen.insert(normalize_key(&title)) {
            debug!(title = %title, "pubmed: duplicate title skipped");
            continue;
        }

        let mut authors: Vec<String> = article
            .authors
            .iter()
            .take(AUTHORS_PER_PUBLICATION)
            .filter_map(PubMedAuthor::full_name)
            .collect();
        if authors.is_empty() {
            authors = match article.authors.iter().find(|a| !a.collective_name.is_empty()) {
                Some(group) => vec![group.collective_name.clone()],
                None => vec!["Authors not listed".to_string()],
            };
        }

        let abstract_text = if article.abstract_text.is_empty() {
            format!("Research study on {}.", term)
        } else {
            truncate_snippet(&article.abstract_text, PUBLICATION_ABSTRACT_CHARS)
        };

        publications.push(Publication {
            id: article.pmid.parse().unwrap_or(i as u64 + 1),
            pmid: (!article.pmid.is_empty()).then(|| article.pmid.clone()),
            title,
            journal: if article.journal.is_empty() {
                "Medical Journal".to_string()
            } else {
                clean_html_entities(&article.journal)
            },
            authors,
            date: if article.year.is_empty() {
                "2024-01-01".to_string()
            } else {
                format!("{}-01-01", article.year)
            },
            doi: (!article.doi.is_empty()).then(|| article.doi.clone()),
            abstract_text,
        });
    }
    publications
}

fn catalog_publication(
    id: u64,
    title: &str,
    journal: &str,
    authors: [&str; 2],
    date: &str,
    doi: &str,
    abstract_text: &str,
) -> Publication {
    Publication {
        id,
        pmid: None,
        title: title.to_string(),
        journal: journal.to_string(),
        authors: authors.iter().map(|a| a.to_string()).collect(),
        date: date.to_string(),
        doi: Some(doi.to_string()),
        abstract_text: abstract_text.to_string(),
    }
}

/// Built-in publications whose title contains `term` (all of them for an
/// empty term).
pub fn catalog_publications(term: &str) -> Vec<Publication> {
    let needle = normalize_key(term);
    [
        catalog_publication(
            1,
            "Recent Advances in Brain Cancer Treatment",
            "Nature Medicine",
            ["Dr. Sarah Johnson", "Dr. Michael Chen"],
            "2024-01-15",
            "10.1038/nm.2024.001",
            "This study presents recent advances in brain cancer treatment...",
        ),
        catalog_publication(
            2,
            "Immunotherapy Breakthrough in Oncology",
            "NEJM",
            ["Dr. Emily Rodriguez", "Dr. James Wilson"],
            "2024-01-10",
            "10.1056/nejm.2024.001",
            "A breakthrough study on immunotherapy applications...",
        ),
    ]
    .into_iter()
    .filter(|p| p.title.to_lowercase().contains(&needle))
    .collect()
}

/// Pick what a publication search shows: registry results when there are
/// any, the matching catalog entries when there are none, and a single
/// generic entry when the registry failed.
pub fn resolve_publications(
    term: &str,
    result: Result<Vec<Publication>, MatchError>,
) -> PublicationSearch {
    let query = term.trim().to_string();
    match result {
        Ok(publications) if !publications.is_empty() => PublicationSearch {
            query,
            publications,
            fallback: false,
            error: None,
        },
        Ok(_) => PublicationSearch {
            publications: catalog_publications(&query),
            query,
            fallback: true,
            error: None,
        },
        Err(e) => {
            warn!(term = %query, error = %e, "pubmed: publication search failed");
            let topic = if query.is_empty() {
                "Medical Topics"
            } else {
                query.as_str()
            };
            let publication = Publication {
                id: 1,
                pmid: None,
                title: format!("Research on {}", topic),
                journal: "Medical Journal".to_string(),
                authors: vec!["Research Team".to_string()],
                date: "2024-01-01".to_string(),
                doi: Some("10.1000/example.001".to_string()),
                abstract_text: "Medical research article from external database.".to_string(),
            };
            PublicationSearch {
                publications: vec![publication],
                query,
                fallback: true,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Turn parsed articles into expert records: up to two named authors per
/// article, `limit` records overall.
pub fn experts_from_articles(
    term: &str,
    articles: &[PubMedArticle],
    limit: usize,
) -> Vec<SearchableRecord> {
    let mut records = Vec::new();
    for article in articles.iter().take(limit) {
        let affiliation = article.first_affiliation();
        for author in article
            .authors
            .iter()
            .take(AUTHORS_PER_ARTICLE)
            .filter(|a| a.is_complete())
        {
            let institution = if author.affiliation.is_empty() {
                affiliation.unwrap_or(FALLBACK_INSTITUTION)
            } else {
                author.affiliation.as_str()
            };
            let record = SearchableRecord::external(
                Source::Pubmed,
                records.len(),
                RecordKind::Expert,
                format!("Dr. {} {}", author.fore_name, author.last_name),
            )
            .with_specialties([format!("{} Research", term)])
            .with_interests([term.to_string(), "Clinical Research".to_string()])
            .with_institution(institution)
            .with_metadata(json!({
                "pmid": article.pmid,
                "title": clean_html_entities(&article.title),
                "journal": article.journal,
                "year": article.year,
                "abstract": truncate_snippet(&article.abstract_text, 200),
                "affiliation": affiliation,
            }));
            records.push(record);
        }
    }
    records.truncate(limit);
    records
}

#[async_trait]
impl RecordSource for PubMedSource {
    fn source(&self) -> Source {
        Source::Pubmed
    }

    fn description(&self) -> &'static str {
        "PubMed authors publishing on the condition"
    }

    fn supports(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Expert
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
        let query = format!("{}[Title/Abstract]", request.term);
        let ids = self.search_ids(query, request.limit).await?;
        if ids.is_empty() {
            debug!(term = %request.term, "pubmed: no ids");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ids.into_iter().take(request.limit).collect();
        let articles = self.fetch_articles(&ids).await?;
        debug!(term = %request.term, articles = articles.len(), "pubmed: fetched");
        Ok(experts_from_articles(&request.term, &articles, request.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(fore: &str, last: &str, affiliation: &str) -> PubMedAuthor {
        PubMedAuthor {
            fore_name: fore.into(),
            last_name: last.into(),
            affiliation: affiliation.into(),
            ..Default::default()
        }
    }

    fn article(pmid: &str, authors: Vec<PubMedAuthor>) -> PubMedArticle {
        PubMedArticle {
            pmid: pmid.into(),
            title: format!("Article {}", pmid),
            journal: "Lancet".into(),
            year: "2022".into(),
            abstract_text: "x".repeat(250),
            doi: String::new(),
            authors,
        }
    }

    #[test]
    fn test_two_authors_per_article() {
        let articles = vec![
            article(
                "1",
                vec![
                    author("Ana", "Gomez", "Hospital Clinic, Barcelona, Spain"),
                    author("", "Group", ""),
                    author("Li", "Wei", ""),
                ],
            ),
            article("2", vec![author("Tom", "Berg", "")]),
        ];
        let records = experts_from_articles("glioma", &articles, 3);
        let names: Vec<&str> = records.iter().map(|r| r.display_name.as_str()).collect();
        // the incomplete second author still counts toward the two-per-article cap
        assert_eq!(names, vec!["Dr. Ana Gomez", "Dr. Tom Berg"]);
        assert_eq!(records[0].id, 1000);
        assert_eq!(records[1].id, 1001);
        assert_eq!(records[0].location(), "Barcelona, Spain");
        assert_eq!(records[1].institution_raw, FALLBACK_INSTITUTION);
        assert_eq!(records[0].metadata["pmid"], "1");
        assert_eq!(
            records[0].metadata["abstract"].as_str().unwrap().len(),
            203
        );
        assert!(records.iter().all(|r| !r.contact_available && r.needs_admin_review));
    }

    #[test]
    fn test_limit_applies_to_records() {
        let articles = vec![article(
            "1",
            vec![author("A", "One", ""), author("B", "Two", "")],
        )];
        assert_eq!(experts_from_articles("x", &articles, 1).len(), 1);
        assert!(experts_from_articles("x", &articles, 0).is_empty());
    }

    #[test]
    fn test_publications_skip_duplicate_titles() {
        let mut first = article("101", vec![author("Ana", "Gomez", ""), author("", "Berg", "")]);
        first.title = "Glioma &amp;amp; IDH mutations".into();
        first.doi = "10.1/a".into();
        first.abstract_text = "y".repeat(400);
        let mut repeat = article("102", vec![author("Tom", "Berg", "")]);
        repeat.title = "GLIOMA & IDH MUTATIONS".into();
        let mut group = article("103", vec![PubMedAuthor {
            collective_name: "Glioma Consortium".into(),
            ..Default::default()
        }]);
        group.abstract_text.clear();
        group.year.clear();

        let publications = publications_from_articles("glioma", &[first, repeat, group], 5);
        assert_eq!(publications.len(), 2);
        assert_eq!(publications[0].title, "Glioma & IDH mutations");
        assert_eq!(publications[0].id, 101);
        assert_eq!(publications[0].authors, vec!["Ana Gomez", "Berg"]);
        assert_eq!(publications[0].doi.as_deref(), Some("10.1/a"));
        assert_eq!(publications[0].date, "2022-01-01");
        assert_eq!(publications[0].abstract_text.len(), 303);

        assert_eq!(publications[1].pmid.as_deref(), Some("103"));
        assert_eq!(publications[1].authors, vec!["Glioma Consortium"]);
        assert_eq!(publications[1].abstract_text, "Research study on glioma.");
        assert_eq!(publications[1].date, "2024-01-01");
        assert_eq!(publications[1].doi, None);
    }

    #[test]
    fn test_publication_limit_counts_distinct_titles() {
        let articles = vec![
            article("1", vec![]),
            article("1", vec![]),
            article("2", vec![]),
        ];
        let publications = publications_from_articles("x", &articles, 2);
        let ids: Vec<u64> = publications.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(publications[0].authors, vec!["Authors not listed"]);
    }

    #[test]
    fn test_resolve_publications_fallbacks() {
        let found = resolve_publications("glioma", Ok(vec![catalog_publications("")[0].clone()]));
        assert!(!found.fallback);
        assert_eq!(found.publications.len(), 1);

        let empty = resolve_publications("brain cancer", Ok(Vec::new()));
        assert!(empty.fallback);
        assert_eq!(empty.publications.len(), 1);
        assert_eq!(empty.publications[0].journal, "Nature Medicine");
        assert!(resolve_publications("psoriasis", Ok(Vec::new())).publications.is_empty());

        let failed = resolve_publications(
            "adhd",
            Err(MatchError::UpstreamStatus {
                source_name: "pubmed".into(),
                status: 503,
            }),
        );
        assert!(failed.fallback);
        assert_eq!(failed.publications[0].title, "Research on adhd");
        assert_eq!(failed.error.as_deref(), Some("Upstream pubmed returned 503"));
    }

    #[tokio::test]
    async fn test_publication_search_requires_a_term() {
        let source = PubMedSource::new(&SourceSettings::defaults(Source::Pubmed)).unwrap();
        let err = source.search_publications("  ", 5).await.unwrap_err();
        assert_eq!(err.code_str(), "invalid_input");
    }
}
