//! Integration tests for the rule router.
//!
//! Tests cover:
//! 1. Determinism of resolution
//! 2. Specificity ordering regardless of registration order
//! 3. Method union on mismatch
//! 4. Trailing slash redirects
//! 5. Converter failure fallback
//! 6. Round-trip between building and matching
//! 7. Configuration errors at registration time
//! 8. The users end-to-end scenario
//! 9. Custom converters

use std::sync::Arc;

use hypr_rs_core::HyprError;
use hypr_rs_http::urls::args::ConverterArgs;
use hypr_rs_http::urls::converters::{ConverterRegistry, PathConverter, StringConverter};
use hypr_rs_http::urls::rule::{Rule, RuleMatch};
use hypr_rs_http::{PathArgs, PathValue, Router};

fn users_router() -> Router<str> {
    let mut router: Router<str> = Router::new();
    router
        .add_provider(Arc::from("user"), &["/users/<int:id>"], Some(&["GET"]), "user", false)
        .unwrap();
    router
        .add_provider(Arc::from("user_str"), &["/users/<id>"], Some(&["GET"]), "user_str", false)
        .unwrap();
    router
        .add_provider(
            Arc::from("users_list"),
            &["/users/"],
            Some(&["GET", "POST"]),
            "users_list",
            false,
        )
        .unwrap();
    router
}

// ============================================================================
// 1. Determinism
// ============================================================================

#[test]
fn test_resolve_is_deterministic() {
    let router = users_router();
    for _ in 0..10 {
        let m = router.resolve("/users/42", "GET").unwrap();
        assert_eq!(m.endpoint(), "user");
        assert_eq!(m.variables["id"], PathValue::Int(42));
    }
    let order: Vec<&str> = router.iter_rules(None).collect();
    assert_eq!(order, router.iter_rules(None).collect::<Vec<_>>());
}

// ============================================================================
// 2. Specificity ordering
// ============================================================================

#[test]
fn test_static_rule_beats_dynamic_rule() {
    for reversed in [false, true] {
        let mut router: Router<str> = Router::new();
        let mut registrations = vec![("/a/<x>", "dynamic"), ("/a/fixed", "static")];
        if reversed {
            registrations.reverse();
        }
        for (url, endpoint) in registrations {
            router
                .add_provider(Arc::from(endpoint), &[url], None, endpoint, false)
                .unwrap();
        }
        assert_eq!(router.resolve("/a/fixed", "GET").unwrap().endpoint(), "static");
        assert_eq!(router.iter_rules(None).next(), Some("/a/fixed"));
    }
}

#[test]
fn test_lighter_converter_is_tried_first() {
    let mut router: Router<str> = Router::new();
    router
        .add_provider(Arc::from("path"), &["/f/<path:p>"], None, "path", false)
        .unwrap();
    router
        .add_provider(Arc::from("segment"), &["/f/<p>"], None, "segment", false)
        .unwrap();
    assert_eq!(router.resolve("/f/a", "GET").unwrap().endpoint(), "segment");
    assert_eq!(router.resolve("/f/a/b", "GET").unwrap().endpoint(), "path");
}

// ============================================================================
// 3. Method union
// ============================================================================

#[test]
fn test_method_union_on_mismatch() {
    let mut router: Router<str> = Router::new();
    router
        .add_provider(Arc::from("get"), &["/items"], Some(&["GET"]), "items_get", false)
        .unwrap();
    router
        .add_provider(Arc::from("post"), &["/items"], Some(&["POST"]), "items_post", false)
        .unwrap();

    let err = router.resolve("/items", "DELETE").unwrap_err();
    assert!(matches!(
        err,
        HyprError::MethodNotAllowed { ref allowed, .. }
            if *allowed == vec!["GET".to_string(), "POST".to_string()]
    ));
    assert_eq!(err.status_code(), 405);
    assert!(matches!(
        router.resolve("/other", "DELETE").unwrap_err(),
        HyprError::NotFound(_)
    ));
}

// ============================================================================
// 4. Trailing slash redirect
// ============================================================================

#[test]
fn test_trailing_slash_redirect() {
    let mut router: Router<str> = Router::new();
    router
        .add_provider(Arc::from("a"), &["/a/"], None, "a", false)
        .unwrap();
    assert!(matches!(
        router.resolve("/a", "GET").unwrap_err(),
        HyprError::TemporaryRedirect(target) if target == "/a/"
    ));
    assert_eq!(router.resolve("/a/", "GET").unwrap().endpoint(), "a");
}

// ============================================================================
// 5. Converter failure fallback
// ============================================================================

#[test]
fn test_converter_failure_falls_through() {
    let mut router: Router<str> = Router::new();
    router
        .add_provider(Arc::from("int"), &["/x/<int:n>"], None, "int", false)
        .unwrap();
    router
        .add_provider(Arc::from("str"), &["/x/<n>"], None, "str", false)
        .unwrap();

    let m = router.resolve("/x/abc", "GET").unwrap();
    assert_eq!(m.endpoint(), "str");
    assert_eq!(m.variables["n"], PathValue::Str("abc".into()));

    let m = router.resolve("/x/42", "GET").unwrap();
    assert_eq!(m.endpoint(), "int");
    assert_eq!(m.variables["n"], PathValue::Int(42));
}

// ============================================================================
// 6. Round-trip
// ============================================================================

#[test]
fn test_build_then_match_returns_values() {
    let registry = ConverterRegistry::new();
    let cases: Vec<(&str, Vec<(&str, PathValue)>)> = vec![
        ("/users/<int:id>", vec![("id", PathValue::Int(42))]),
        ("/tags/<tag>/", vec![("tag", PathValue::Str("rust".into()))]),
        (
            "/price/<float:amount>/<any(eur, usd):currency>",
            vec![
                ("amount", PathValue::Float(9.5)),
                ("currency", PathValue::Str("usd".into())),
            ],
        ),
        (
            "/objects/<uuid:key>",
            vec![(
                "key",
                PathValue::Uuid("67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap()),
            )],
        ),
        (
            "/static/<path:file>",
            vec![("file", PathValue::Path("css/site.css".into()))],
        ),
    ];

    for (url, values) in cases {
        let rule = Rule::compiled(url, "e", None, &registry).unwrap();
        let args: PathArgs = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let built = rule.build(&args).unwrap();
        assert_eq!(rule.match_path(&built), RuleMatch::Match(args), "rule {url}");
    }
}

#[test]
fn test_url_for_endpoint() {
    let router = users_router();
    let mut args = PathArgs::new();
    args.insert("id".into(), PathValue::Int(7));
    assert_eq!(router.url_for("user", &args).unwrap(), "/users/7");
    assert_eq!(router.url_for("users_list", &PathArgs::new()).unwrap(), "/users/");
}

// ============================================================================
// 7. Configuration errors
// ============================================================================

#[test]
fn test_duplicate_endpoint_rejected_at_registration() {
    let mut router = users_router();
    let before = router.len();
    let err = router
        .add_provider(Arc::from("again"), &["/again"], None, "user", false)
        .unwrap_err();
    assert!(err.is_configuration_error());
    assert_eq!(router.len(), before);
}

#[test]
fn test_rule_errors_are_configuration_errors() {
    let mut router: Router<str> = Router::new();
    let cases = [
        ("/a/<x>/<x>", "dup"),
        ("/a/<x", "malformed"),
        ("/a/<unknown:x>", "unknown"),
        ("/a/<int(base=16):x>", "bad_args"),
        ("relative", "relative"),
    ];
    for (url, endpoint) in cases {
        let err = router
            .add_provider(Arc::from(endpoint), &[url], None, endpoint, false)
            .unwrap_err();
        assert!(err.is_configuration_error(), "{url}: {err}");
    }
    assert!(router.is_empty());
    assert!(router.endpoints().is_empty());
}

// ============================================================================
// 8. End-to-end users scenario
// ============================================================================

#[test]
fn test_users_scenario() {
    let router = users_router();

    let m = router.resolve("/users/42", "GET").unwrap();
    assert_eq!(m.endpoint(), "user");
    assert_eq!(m.variables["id"], PathValue::Int(42));

    let m = router.resolve("/users/bob", "GET").unwrap();
    assert_eq!(m.endpoint(), "user_str");
    assert_eq!(m.variables["id"], PathValue::Str("bob".into()));

    assert!(matches!(
        router.resolve("/users", "GET").unwrap_err(),
        HyprError::TemporaryRedirect(target) if target == "/users/"
    ));

    match router.resolve("/users/", "DELETE").unwrap_err() {
        HyprError::MethodNotAllowed { allowed, .. } => {
            assert_eq!(allowed, vec!["GET".to_string(), "POST".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(router.get_provider("users_list").map(|h| &**h), Some("users_list"));
    assert_eq!(
        router.iter_rules(Some("user")).collect::<Vec<_>>(),
        vec!["/users/<int:id>"]
    );
}

// ============================================================================
// 9. Custom converters
// ============================================================================

#[derive(Debug)]
struct YearConverter;

impl PathConverter for YearConverter {
    fn regex(&self) -> &str {
        r"\d{4}"
    }

    fn weight(&self) -> i64 {
        40
    }

    fn to_native(&self, value: &str) -> hypr_rs_core::HyprResult<PathValue> {
        value
            .parse()
            .map(PathValue::Int)
            .map_err(|_| HyprError::ConversionFailed(value.to_string()))
    }

    fn to_url(&self, value: &PathValue) -> hypr_rs_core::HyprResult<String> {
        Ok(value.to_string())
    }
}

#[test]
fn test_custom_converter_registry() {
    let mut registry = ConverterRegistry::new();
    registry.register(
        "year",
        Arc::new(|_: &ConverterArgs| Ok(Box::new(YearConverter) as Box<dyn PathConverter>)),
    );
    registry.register(
        "default",
        Arc::new(|_: &ConverterArgs| {
            Ok(Box::new(StringConverter::new(2, None, None)) as Box<dyn PathConverter>)
        }),
    );

    let mut router: Router<str> = Router::with_converters(registry);
    router
        .add_provider(Arc::from("archive"), &["/archive/<year:y>"], None, "archive", false)
        .unwrap();
    router
        .add_provider(Arc::from("page"), &["/p/<name>"], None, "page", false)
        .unwrap();

    let m = router.resolve("/archive/2016", "GET").unwrap();
    assert_eq!(m.variables["y"], PathValue::Int(2016));
    assert!(router.resolve("/archive/16", "GET").is_err());
    assert!(router.resolve("/p/a", "GET").is_err());
    assert!(router.resolve("/p/ab", "GET").is_ok());
}
