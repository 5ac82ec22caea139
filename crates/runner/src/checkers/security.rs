//! Security checker
//!
//! Transport, response headers, cookies, a reflected-XSS probe and the
//! page's forms and inline scripts. Everything except the probe is derived
//! from the main-document response and one DOM snapshot.

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use sitegate_common::{Category, CategoryResult, Issue, IssueType, Severity};

use super::{CheckContext, Checker, Findings};
use crate::config::SecurityConfig;
use crate::error::InspectorResult;
use crate::inspector::{Cookie, DomSnapshot, NavigationResponse, PageInspector};

const HTTPS: &str = "https";
const HEADERS: &str = "headers";
const COOKIES: &str = "cookies";
const XSS: &str = "xss";
const SCRIPTS: &str = "scripts";
const MIXED_CONTENT: &str = "mixed_content";
const FORMS: &str = "forms";

/// Query parameter and payload used by the reflected-XSS probe
pub const XSS_PARAM: &str = "sitegate_probe";
pub const XSS_PAYLOAD: &str = "<script>alert('sg-xss')</script>";

const SUBRESOURCE_ATTRS: &[(&str, &str)] = &[
    ("img", "src"),
    ("script", "src"),
    ("iframe", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("source", "src"),
    ("embed", "src"),
    ("link", "href"),
];

pub struct SecurityChecker {
    config: SecurityConfig,
}

impl SecurityChecker {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Transport and header checks against the main-document response
    pub fn inspect_response(&self, target: &Url, response: &NavigationResponse, findings: &mut Findings) {
        let final_https = response.url.starts_with("https://") || (response.url.is_empty() && target.scheme() == "https");
        findings.metric("https", final_https);

        if target.scheme() != "https" {
            if final_https {
                findings.push(
                    Issue::new(
                        IssueType::HttpRedirectsToHttps,
                        Severity::Info,
                        format!("{} redirects to HTTPS", target),
                    )
                    .in_check(HTTPS)
                    .with_value(response.url.clone()),
                );
            } else {
                findings.push(
                    Issue::new(IssueType::NoHttps, Severity::Critical, "Site is served over plain HTTP without redirecting to HTTPS")
                        .in_check(HTTPS)
                        .with_value(target.to_string()),
                );
            }
        }

        let mut present = 0;
        for rule in &self.config.headers {
            let is_hsts = rule.header.eq_ignore_ascii_case("strict-transport-security");
            // HSTS is ignored by browsers on plain HTTP
            if is_hsts && !final_https {
                continue;
            }
            if response.header(&rule.header).is_some() {
                present += 1;
                continue;
            }
            findings.push(
                Issue::new(
                    IssueType::MissingSecurityHeader,
                    rule.severity,
                    format!("Missing {} header", rule.header),
                )
                .in_check(HEADERS)
                .with_value(rule.header.clone()),
            );
        }
        findings.metric("security_headers_present", present);

        if let Some(csp) = response.header("content-security-policy") {
            let csp = csp.to_ascii_lowercase();
            if csp.contains("'unsafe-inline'") {
                findings.push(
                    Issue::new(IssueType::CspUnsafeInline, Severity::Moderate, "Content-Security-Policy allows 'unsafe-inline'")
                        .in_check(HEADERS),
                );
            }
            if csp.contains("'unsafe-eval'") {
                findings.push(
                    Issue::new(IssueType::CspUnsafeEval, Severity::Moderate, "Content-Security-Policy allows 'unsafe-eval'")
                        .in_check(HEADERS),
                );
            }
        }

        if let Some(hsts) = response.header("strict-transport-security").filter(|_| final_https) {
            let max_age = hsts_max_age(hsts);
            if max_age.map(|age| age < self.config.hsts_min_max_age).unwrap_or(true) {
                findings.push(
                    Issue::new(
                        IssueType::HstsLowMaxAge,
                        Severity::Minor,
                        format!(
                            "HSTS max-age is {} (recommended at least {})",
                            max_age.map(|a| a.to_string()).unwrap_or_else(|| "missing".into()),
                            self.config.hsts_min_max_age
                        ),
                    )
                    .in_check(HEADERS),
                );
            }
            if !hsts.to_ascii_lowercase().contains("includesubdomains") {
                findings.push(
                    Issue::new(IssueType::HstsNoSubdomains, Severity::Info, "HSTS does not include subdomains").in_check(HEADERS),
                );
            }
        }

        if let Some(xfo) = response.header("x-frame-options") {
            let value = xfo.trim().to_ascii_uppercase();
            if value != "DENY" && value != "SAMEORIGIN" {
                findings.push(
                    Issue::new(IssueType::XfoWeakValue, Severity::Minor, format!("X-Frame-Options has weak value '{}'", xfo))
                        .in_check(HEADERS)
                        .with_value(xfo),
                );
            }
        }
        if let Some(server) = response.header("server") {
            findings.push(
                Issue::new(IssueType::ServerDisclosure, Severity::Info, format!("Server header discloses '{}'", server))
                    .in_check(HEADERS)
                    .with_value(server),
            );
        }
        if let Some(powered) = response.header("x-powered-by") {
            findings.push(
                Issue::new(
                    IssueType::XPoweredByDisclosure,
                    Severity::Info,
                    format!("X-Powered-By header discloses '{}'", powered),
                )
                .in_check(HEADERS)
                .with_value(powered),
            );
        }
    }

    pub fn inspect_cookies(&self, cookies: &[Cookie], https: bool, findings: &mut Findings) {
        for cookie in cookies {
            let mut missing = Vec::new();
            if https && !cookie.secure {
                missing.push("Secure");
            }
            if !cookie.http_only {
                missing.push("HttpOnly");
            }
            if cookie.same_site.as_deref().map(str::is_empty).unwrap_or(true) {
                missing.push("SameSite");
            }
            if !missing.is_empty() {
                findings.push(
                    Issue::new(
                        IssueType::InsecureCookie,
                        Severity::Moderate,
                        format!("Cookie '{}' lacks {}", cookie.name, missing.join(", ")),
                    )
                    .in_check(COOKIES)
                    .with_value(cookie.name.clone()),
                );
            }
        }
        findings.metric("cookies", cookies.len());
    }

    /// Inline scripts, mixed content and forms
    pub fn inspect_document(&self, snapshot: &DomSnapshot, https: bool, findings: &mut Findings) {
        let risky_scripts = snapshot
            .by_tag("script")
            .filter(|(_, e)| !e.has_attr("src"))
            .filter(|(_, e)| {
                let text = e.trimmed_text();
                text.contains(".innerHTML") || text.contains(".outerHTML") || text.contains("document.write(")
            })
            .count();
        if risky_scripts > 0 {
            findings.push(
                Issue::new(
                    IssueType::InnerhtmlUsage,
                    Severity::Moderate,
                    format!("{} inline scripts write raw HTML (innerHTML/document.write)", risky_scripts),
                )
                .in_check(SCRIPTS)
                .with_count(risky_scripts),
            );
        }

        if https && self.config.check_mixed_content {
            let insecure: Vec<String> = snapshot
                .iter()
                .filter_map(|(_, e)| {
                    SUBRESOURCE_ATTRS
                        .iter()
                        .find(|(tag, _)| e.is(tag))
                        .and_then(|(_, attr)| e.attr(attr))
                })
                .filter(|url| url.trim().to_ascii_lowercase().starts_with("http://"))
                .map(str::to_string)
                .collect();
            if !insecure.is_empty() {
                findings.push(
                    Issue::new(
                        IssueType::MixedContent,
                        Severity::Moderate,
                        format!("{} resources are loaded over HTTP on an HTTPS page", insecure.len()),
                    )
                    .in_check(MIXED_CONTENT)
                    .with_count(insecure.len())
                    .with_value(insecure.into_iter().take(5).collect::<Vec<_>>()),
                );
            }
        }

        if self.config.check_forms {
            self.inspect_forms(snapshot, findings);
        }
    }

    fn inspect_forms(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        for (index, form) in snapshot.by_tag("form") {
            let selector = form.selector();
            if form.non_empty_attr("action").is_none() {
                findings.push(
                    Issue::new(IssueType::FormNoAction, Severity::Info, "Form has no action attribute")
                        .in_check(FORMS)
                        .with_selector(selector.clone()),
                );
            }
            let passwords: Vec<_> = snapshot
                .descendants(index)
                .filter(|(_, e)| e.is("input") && e.attr("type").map(|t| t.eq_ignore_ascii_case("password")).unwrap_or(false))
                .map(|(_, e)| e)
                .collect();
            if passwords.is_empty() {
                continue;
            }
            // forms submit with GET unless told otherwise
            let method = form.non_empty_attr("method").unwrap_or("get");
            if method.eq_ignore_ascii_case("get") {
                findings.push(
                    Issue::new(
                        IssueType::PasswordInGetForm,
                        Severity::High,
                        "Password field in a form submitted with GET",
                    )
                    .in_check(FORMS)
                    .with_selector(selector.clone()),
                );
            }
            let unguarded = passwords.iter().filter(|p| !p.has_attr("autocomplete")).count();
            if unguarded > 0 {
                findings.push(
                    Issue::new(
                        IssueType::PasswordNoAutocomplete,
                        Severity::Minor,
                        "Password field has no autocomplete attribute",
                    )
                    .in_check(FORMS)
                    .with_selector(selector)
                    .with_count(unguarded),
                );
            }
        }
    }

    async fn probe_xss(&self, ctx: &CheckContext, page: &dyn PageInspector, findings: &mut Findings) -> InspectorResult<()> {
        let mut probe = ctx.target.clone();
        probe.query_pairs_mut().append_pair(XSS_PARAM, XSS_PAYLOAD);
        let Some(response) = findings.fetch_optional(XSS, page, &probe).await? else {
            return Ok(());
        };
        if response.body.contains(XSS_PAYLOAD) {
            findings.push(
                Issue::new(
                    IssueType::XssInParameter,
                    Severity::High,
                    format!("Query parameter '{}' is reflected without encoding", XSS_PARAM),
                )
                .in_check(XSS)
                .with_value(probe.to_string()),
            );
        } else {
            debug!("XSS probe payload not reflected");
        }
        Ok(())
    }

    async fn run(
        &self,
        ctx: &CheckContext,
        page: &dyn PageInspector,
        response: &NavigationResponse,
        findings: &mut Findings,
    ) -> InspectorResult<()> {
        self.inspect_response(&ctx.target, response, findings);
        let https = response.url.starts_with("https://") || (response.url.is_empty() && ctx.target.scheme() == "https");

        if self.config.check_cookies {
            let cookies = page.cookies().await;
            if let Some(cookies) = findings.tolerate(COOKIES, cookies)? {
                self.inspect_cookies(&cookies, https, findings);
            }
        }
        if self.config.probe_reflected_xss {
            self.probe_xss(ctx, page, findings).await?;
        }
        let snapshot = page.snapshot().await;
        if let Some(snapshot) = findings.tolerate("snapshot", snapshot)? {
            self.inspect_document(&snapshot, https, findings);
        }
        Ok(())
    }
}

/// `max-age` directive of a Strict-Transport-Security value
fn hsts_max_age(value: &str) -> Option<u64> {
    value.split(';').find_map(|directive| {
        let (name, age) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            age.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

#[async_trait]
impl Checker for SecurityChecker {
    fn category(&self) -> Category {
        Category::Security
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Checking security for {}", ctx.target);
        let (page, response) = ctx.open_target().await?;
        let mut findings = Findings::new();
        let outcome = self.run(ctx, page.as_ref(), &response, &mut findings).await;
        page.close().await;
        outcome?;
        Ok(findings.into_result(Category::Security, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::body;
    use super::*;
    use crate::inspector::DomElement;
    use std::collections::BTreeMap;
    use test_case::test_case;

    fn response(url: &str, headers: &[(&str, &str)]) -> NavigationResponse {
        NavigationResponse {
            status: 200,
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn hardened() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Content-Security-Policy", "default-src 'self'"),
            ("Strict-Transport-Security", "max-age=63072000; includeSubDomains"),
            ("X-Frame-Options", "DENY"),
            ("X-Content-Type-Options", "nosniff"),
            ("Permissions-Policy", "camera=()"),
            ("Referrer-Policy", "no-referrer"),
        ]
    }

    #[test]
    fn test_missing_csp_and_hsts_fail_with_high() {
        let checker = SecurityChecker::new(SecurityConfig::default());
        let target = Url::parse("https://example.com/").unwrap();
        let headers: Vec<_> = hardened().into_iter().skip(2).collect();
        let mut findings = Findings::new();
        checker.inspect_response(&target, &response("https://example.com/", &headers), &mut findings);

        let result = findings.into_result(Category::Security, Severity::High);
        assert!(!result.passed());
        let high: Vec<_> = result
            .issues()
            .iter()
            .filter(|i| i.kind == IssueType::MissingSecurityHeader && i.severity == Severity::High)
            .collect();
        assert_eq!(high.len(), 2);
    }

    #[test]
    fn test_plain_http_without_redirect_is_critical() {
        let checker = SecurityChecker::new(SecurityConfig::default());
        let target = Url::parse("http://example.com/").unwrap();
        let mut findings = Findings::new();
        checker.inspect_response(&target, &response("http://example.com/", &hardened()), &mut findings);
        let result = findings.into_result(Category::Security, Severity::High);
        assert!(!result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::NoHttps);
        assert_eq!(result.issues()[0].severity, Severity::Critical);
    }

    #[test]
    fn test_http_redirecting_to_https_is_info() {
        let checker = SecurityChecker::new(SecurityConfig::default());
        let target = Url::parse("http://example.com/").unwrap();
        let mut findings = Findings::new();
        checker.inspect_response(&target, &response("https://example.com/", &hardened()), &mut findings);
        let result = findings.into_result(Category::Security, Severity::High);
        assert!(result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::HttpRedirectsToHttps);
    }

    #[test]
    fn test_header_quality() {
        let checker = SecurityChecker::new(SecurityConfig::default());
        let target = Url::parse("https://example.com/").unwrap();
        let headers = vec![
            ("Content-Security-Policy", "script-src 'self' 'unsafe-inline' 'unsafe-eval'"),
            ("Strict-Transport-Security", "max-age=3600"),
            ("X-Frame-Options", "ALLOW-FROM https://ads.example"),
            ("X-Content-Type-Options", "nosniff"),
            ("Permissions-Policy", "camera=()"),
            ("Referrer-Policy", "no-referrer"),
            ("Server", "nginx/1.18.0"),
            ("X-Powered-By", "PHP/8.1"),
        ];
        let mut findings = Findings::new();
        checker.inspect_response(&target, &response("https://example.com/", &headers), &mut findings);
        for kind in [
            IssueType::CspUnsafeInline,
            IssueType::CspUnsafeEval,
            IssueType::HstsLowMaxAge,
            IssueType::HstsNoSubdomains,
            IssueType::XfoWeakValue,
            IssueType::ServerDisclosure,
            IssueType::XPoweredByDisclosure,
        ] {
            assert_eq!(findings.count(kind), 1, "{}", kind);
        }
        assert_eq!(findings.count(IssueType::MissingSecurityHeader), 0);
        assert!(findings.into_result(Category::Security, Severity::High).passed());
    }

    #[test_case(None, Severity::High ; "default method is get")]
    #[test_case(Some("GET"), Severity::High ; "explicit get")]
    fn test_password_in_get_form(method: Option<&str>, expected: Severity) {
        let checker = SecurityChecker::new(SecurityConfig::default());
        let mut form = DomElement::new("form").with_attr("action", "/login");
        if let Some(method) = method {
            form = form.with_attr("method", method);
        }
        let snap = body(vec![form, DomElement::new("input").with_attr("type", "password").with_parent(2)]);
        let mut findings = Findings::new();
        checker.inspect_document(&snap, true, &mut findings);
        let issue = findings.issues().iter().find(|i| i.kind == IssueType::PasswordInGetForm).unwrap();
        assert_eq!(issue.severity, expected);
        assert_eq!(findings.count(IssueType::PasswordNoAutocomplete), 1);
        assert_eq!(findings.count(IssueType::FormNoAction), 0);
    }

    #[test]
    fn test_post_form_and_mixed_content() {
        let checker = SecurityChecker::new(SecurityConfig::default());
        let mut inline = DomElement::new("script");
        inline.text = "el.innerHTML = location.hash;".into();
        let snap = body(vec![
            DomElement::new("form").with_attr("method", "post"),
            DomElement::new("input")
                .with_attr("type", "password")
                .with_attr("autocomplete", "current-password")
                .with_parent(2),
            DomElement::new("img").with_attr("src", "http://cdn.example.com/a.png"),
            DomElement::new("script").with_attr("src", "https://cdn.example.com/app.js"),
            inline,
        ]);
        let mut findings = Findings::new();
        checker.inspect_document(&snap, true, &mut findings);
        assert_eq!(findings.count(IssueType::PasswordInGetForm), 0);
        assert_eq!(findings.count(IssueType::PasswordNoAutocomplete), 0);
        assert_eq!(findings.count(IssueType::FormNoAction), 1);
        assert_eq!(findings.count(IssueType::MixedContent), 1);
        assert_eq!(findings.count(IssueType::InnerhtmlUsage), 1);

        let mut plain = Findings::new();
        checker.inspect_document(&snap, false, &mut plain);
        assert_eq!(plain.count(IssueType::MixedContent), 0);
    }

    #[test]
    fn test_cookie_flags() {
        let checker = SecurityChecker::new(SecurityConfig::default());
        let cookies = vec![
            Cookie {
                name: "session".into(),
                secure: true,
                http_only: true,
                same_site: Some("Lax".into()),
                ..Default::default()
            },
            Cookie {
                name: "tracking".into(),
                ..Default::default()
            },
        ];
        let mut findings = Findings::new();
        checker.inspect_cookies(&cookies, true, &mut findings);
        assert_eq!(findings.count(IssueType::InsecureCookie), 1);
        assert!(findings.issues()[0].message.contains("Secure, HttpOnly, SameSite"));
    }

    #[test_case("max-age=31536000; includeSubDomains", Some(31_536_000))]
    #[test_case("includeSubDomains; max-age=\"600\"", Some(600))]
    #[test_case("preload", None)]
    fn test_hsts_max_age(value: &str, expected: Option<u64>) {
        assert_eq!(hsts_max_age(value), expected);
    }
}
