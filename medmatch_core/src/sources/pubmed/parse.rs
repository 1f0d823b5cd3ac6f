use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::MatchError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubMedAuthor {
    pub fore_name: String,
    pub last_name: String,
    pub affiliation: String,
    /// Set for group authors ("DCIS Study Group"), which have no names.
    pub collective_name: String,
}

impl PubMedAuthor {
    pub fn is_complete(&self) -> bool {
        !self.fore_name.is_empty() && !self.last_name.is_empty()
    }

    /// "Fore Last", or the last name alone.
    pub fn full_name(&self) -> Option<String> {
        match (self.fore_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => Some(format!("{} {}", self.fore_name, self.last_name)),
            (true, false) => Some(self.last_name.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubMedArticle {
    pub pmid: String,
    pub title: String,
    pub journal: String,
    pub year: String,
    pub abstract_text: String,
    pub doi: String,
    pub authors: Vec<PubMedAuthor>,
}

impl PubMedArticle {
    /// First non-empty author affiliation.
    pub fn first_affiliation(&self) -> Option<&str> {
        self.authors
            .iter()
            .map(|a| a.affiliation.as_str())
            .find(|a| !a.is_empty())
    }
}

/// Pull the ids out of an esearch JSON response.
pub fn parse_esearch_ids(body: &serde_json::Value) -> Vec<String> {
    body.pointer("/esearchresult/idlist")
        .and_then(|v| v.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Start tags whose text is the article DOI.
fn is_doi_tag(e: &BytesStart<'_>, path: &[String]) -> bool {
    let has_doi_attr = |key: &[u8]| {
        e.attributes()
            .flatten()
            .any(|a| a.key.as_ref() == key && a.value.as_ref() == b"doi")
    };
    match e.name().as_ref() {
        b"ELocationID" => has_doi_attr(b"EIdType"),
        b"ArticleId" => {
            let n = path.len();
            n >= 2
                && path[n - 1] == "ArticleIdList"
                && path[n - 2] == "PubmedData"
                && has_doi_attr(b"IdType")
        }
        _ => false,
    }
}

fn append(target: &mut String, text: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Parse an efetch `PubmedArticleSet` document.
pub fn parse_efetch(xml: &str) -> Result<Vec<PubMedArticle>, MatchError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut articles = Vec::new();
    let mut article: Option<PubMedArticle> = None;
    let mut author: Option<PubMedAuthor> = None;
    let mut path: Vec<String> = Vec::new();
    let mut in_doi = false;
    let mut buffer = Vec::new();

    loop {
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match tag.as_str() {
                    "PubmedArticle" => article = Some(PubMedArticle::default()),
                    "Author" if article.is_some() => author = Some(PubMedAuthor::default()),
                    _ => {}
                }
                in_doi = article.is_some() && is_doi_tag(e, &path);
                path.push(tag);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| MatchError::Parse(format!("pubmed xml: {}", err)))?;
                let text = text.trim();
                if let (Some(current), Some(tag)) = (article.as_mut(), path.last()) {
                    let parent = path.len().checked_sub(2).map(|i| path[i].as_str());
                    let inside = |name: &str| path.iter().any(|p| p == name);

                    if in_doi {
                        if current.doi.is_empty() {
                            current.doi = text.to_string();
                        }
                    } else if let Some(a) = author.as_mut() {
                        match tag.as_str() {
                            "LastName" => a.last_name = text.to_string(),
                            "ForeName" => a.fore_name = text.to_string(),
                            "CollectiveName" => a.collective_name = text.to_string(),
                            "Affiliation" if a.affiliation.is_empty() => {
                                a.affiliation = text.to_string()
                            }
                            _ => {}
                        }
                    } else if inside("ArticleTitle") {
                        append(&mut current.title, text);
                    } else if inside("AbstractText") {
                        append(&mut current.abstract_text, text);
                    } else {
                        match (tag.as_str(), parent) {
                            ("PMID", Some("MedlineCitation")) if current.pmid.is_empty() => {
                                current.pmid = text.to_string()
                            }
                            ("Title", Some("Journal")) => current.journal = text.to_string(),
                            ("ISOAbbreviation", Some("Journal")) if current.journal.is_empty() => {
                                current.journal = text.to_string()
                            }
                            ("Year", Some("PubDate")) if current.year.is_empty() => {
                                current.year = text.to_string()
                            }
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                in_doi = false;
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match tag.as_str() {
                    "Author" => {
                        if let (Some(current), Some(a)) = (article.as_mut(), author.take()) {
                            current.authors.push(a);
                        }
                    }
                    "PubmedArticle" => {
                        if let Some(current) = article.take() {
                            articles.push(current);
                        }
                    }
                    _ => {}
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(MatchError::Parse(format!(
                    "pubmed xml at position {}: {}",
                    reader.buffer_position(),
                    err
                )))
            }
            _ => {}
        }

        buffer.clear();
    }

    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EFETCH: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">38000001</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <PubDate><Year>2023</Year><Month>Nov</Month></PubDate>
          </JournalIssue>
          <Title>Journal of Clinical Oncology</Title>
        </Journal>
        <ArticleTitle>Vaccination in <i>ductal</i> carcinoma &amp; DCIS</ArticleTitle>
        <ELocationID EIdType="pii" ValidYN="Y">S0000-0000(23)00001-1</ELocationID>
        <ELocationID EIdType="doi" ValidYN="Y">10.1200/JCO.2023.001</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND">DCIS is a precursor lesion.</AbstractText>
          <AbstractText Label="METHODS">We enrolled 40 women.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y">
            <LastName>Johnson</LastName>
            <ForeName>Sarah</ForeName>
            <Initials>S</Initials>
            <AffiliationInfo><Affiliation>Johns Hopkins, Baltimore, USA</Affiliation></AffiliationInfo>
          </Author>
          <Author ValidYN="Y">
            <CollectiveName>DCIS Study Group</CollectiveName>
          </Author>
          <Author ValidYN="Y">
            <LastName>Chen</LastName>
            <ForeName>Michael</ForeName>
          </Author>
        </AuthorList>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="Cites"><PMID Version="1">12345</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000002</PMID>
      <Article>
        <Journal><ISOAbbreviation>Neurology</ISOAbbreviation></Journal>
        <ArticleTitle>Gait freezing</ArticleTitle>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">38000002</ArticleId>
        <ArticleId IdType="doi">10.1212/WNL.2023.002</ArticleId>
      </ArticleIdList>
      <ReferenceList>
        <Reference>
          <ArticleIdList><ArticleId IdType="doi">10.9999/cited</ArticleId></ArticleIdList>
        </Reference>
      </ReferenceList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_efetch() {
        let articles = parse_efetch(EFETCH).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.pmid, "38000001");
        assert_eq!(first.journal, "Journal of Clinical Oncology");
        assert_eq!(first.year, "2023");
        assert_eq!(first.title, "Vaccination in ductal carcinoma & DCIS");
        assert_eq!(
            first.abstract_text,
            "DCIS is a precursor lesion. We enrolled 40 women."
        );
        assert_eq!(first.doi, "10.1200/JCO.2023.001");
        assert_eq!(first.authors.len(), 3);
        assert!(first.authors[0].is_complete());
        assert!(!first.authors[1].is_complete());
        assert_eq!(first.authors[1].collective_name, "DCIS Study Group");
        assert_eq!(first.authors[1].full_name(), None);
        assert_eq!(first.authors[2].full_name().as_deref(), Some("Michael Chen"));
        assert_eq!(first.first_affiliation(), Some("Johns Hopkins, Baltimore, USA"));

        let second = &articles[1];
        assert_eq!(second.pmid, "38000002");
        assert_eq!(second.journal, "Neurology");
        assert_eq!(second.doi, "10.1212/WNL.2023.002");
        assert!(second.authors.is_empty());
        assert!(second.year.is_empty());
    }

    #[test]
    fn test_parse_empty_set() {
        assert!(parse_efetch("<PubmedArticleSet></PubmedArticleSet>")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let err = parse_efetch("<PubmedArticleSet><PubmedArticle></Oops>").unwrap_err();
        assert_eq!(err.code_str(), "parse_error");
    }

    #[test]
    fn test_esearch_ids() {
        let body = serde_json::json!({
            "esearchresult": { "count": "2", "idlist": ["1", "2"] }
        });
        assert_eq!(parse_esearch_ids(&body), vec!["1", "2"]);
        assert!(parse_esearch_ids(&serde_json::json!({})).is_empty());
    }
}
