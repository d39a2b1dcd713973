use url::Url;

pub struct DomainParser;
impl DomainParser {
    pub fn get_domain(url: &Url) -> Option<addr::domain::Name<'_>> {
        url.domain().and_then(|x| addr::parse_domain_name(x).ok())
    }

    /// Get the root domain (the registrable part)
    pub fn get_domain_root(url: &Url) -> Option<&str> {
        Self::get_domain(url).and_then(|x| x.root())
    }

    /// Lower-cased host name, without a leading `www.`
    pub fn get_host(url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();

        Some(match host.strip_prefix("www.") {
            Some(h) => h.to_string(),
            None => host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_of_subdomain() {
        let url = Url::parse("https://m.youtube.com/watch?v=abc").unwrap();
        assert_eq!(DomainParser::get_domain_root(&url), Some("youtube.com"));
    }

    #[test]
    fn root_of_short_link() {
        let url = Url::parse("https://youtu.be/abc123").unwrap();
        assert_eq!(DomainParser::get_domain_root(&url), Some("youtu.be"));
    }

    #[test]
    fn ip_host_has_no_root() {
        let url = Url::parse("http://127.0.0.1:8080/video").unwrap();
        assert_eq!(DomainParser::get_domain_root(&url), None);
        assert_eq!(DomainParser::get_host(&url).as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn host_strips_www() {
        let url = Url::parse("https://WWW.Instagram.com/reel/xyz").unwrap();
        assert_eq!(DomainParser::get_host(&url).as_deref(), Some("instagram.com"));
    }
}
