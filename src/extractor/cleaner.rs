use ammonia::{Builder, UrlRelative};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Rebuilds `document` from its sanitized body. Scripts, styles and any
/// element outside Ammonia's allow-list are dropped; allowed text content is
/// kept. With a base URL, relative links are rewritten to absolute ones.
pub fn sanitize(document: &Html, base_url: Option<&Url>) -> Html {
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return Html::parse_document("");
    };

    let mut builder = Builder::default();
    if let Some(base) = base_url {
        builder.url_relative(UrlRelative::RewriteWithBase(base.clone()));
    }
    let clean_html = builder.clean(&body.inner_html()).to_string();

    Html::parse_document(&clean_html)
}
