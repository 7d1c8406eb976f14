use std::collections::BTreeSet;

use accord_core::{Environment, Marker, Package, Requirement, Source, VcsKind, VcsReference, Version};
use accord_resolver::solver::{resolve, CancelToken, ResolveOptions};
use accord_resolver::{MemoryProvider, ResolveError};

fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

fn req(name: &str, constraint: &str) -> Requirement {
    Requirement::registry(name, constraint).unwrap()
}

fn root_with(requirements: Vec<Requirement>) -> Package {
    Package::new("my-package", v("1.2.3")).with_requirements(requirements)
}

#[test]
fn resolves_transitive_dependencies_newest_first() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("cleo", v("0.6.0")).with_requirement(req("pastel", "^0.1")));
    provider.add_package(Package::new("cleo", v("0.6.5")).with_requirement(req("pastel", "^0.1")));
    provider.add_package(Package::new("pastel", v("0.1.0")));
    provider.add_package(Package::new("pastel", v("0.1.1")));

    let root = root_with(vec![req("cleo", "^0.6")]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();

    assert_eq!(resolution.packages.len(), 2);
    assert_eq!(resolution.package("cleo").unwrap().version, v("0.6.5"));
    assert_eq!(resolution.package("pastel").unwrap().version, v("0.1.1"));
}

#[test]
fn selected_versions_lie_within_every_active_constraint() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("a", v("1.0.0")).with_requirement(req("shared", ">=1.2")));
    provider.add_package(Package::new("b", v("1.0.0")).with_requirement(req("shared", "<1.5")));
    for version in ["1.0.0", "1.2.0", "1.4.0", "1.5.0", "1.6.0"] {
        provider.add_package(Package::new("shared", v(version)));
    }

    let root = root_with(vec![req("a", "^1.0"), req("b", "^1.0")]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();

    let shared = resolution.package("shared").unwrap();
    assert_eq!(shared.version, v("1.4.0"));
}

#[test]
fn backtracks_to_an_older_version_on_conflict() {
    let mut provider = MemoryProvider::new();
    provider.add_package(
        Package::new("a", v("1.0.0")).with_requirement(req("shared", ">=1.0,<2.0")),
    );
    provider.add_package(
        Package::new("a", v("1.1.0")).with_requirement(req("shared", ">=2.0,<3.0")),
    );
    provider.add_package(
        Package::new("b", v("1.0.0")).with_requirement(req("shared", ">=1.0,<2.0")),
    );
    for version in ["1.0.0", "1.5.0", "2.0.0"] {
        provider.add_package(Package::new("shared", v(version)));
    }

    let root = root_with(vec![req("a", "^1.0"), req("b", "^1.0")]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();

    assert_eq!(resolution.package("a").unwrap().version, v("1.0.0"));
    assert_eq!(resolution.package("b").unwrap().version, v("1.0.0"));
    assert_eq!(resolution.package("shared").unwrap().version, v("1.5.0"));
}

#[test]
fn conflicting_root_constraints_are_unsatisfiable_with_a_two_step_chain() {
    let mut provider = MemoryProvider::new();
    for version in ["1.2.0", "1.5.0", "2.0.0", "2.4.0"] {
        provider.add_package(Package::new("demo", v(version)));
    }

    let root = root_with(vec![req("demo", "^1.2"), req("demo", "^2.0")]);
    let err = resolve(&root, &provider, &ResolveOptions::default()).unwrap_err();

    let ResolveError::Unsatisfiable { derivation } = err else {
        panic!("expected an unsatisfiable failure, got {err}");
    };
    assert_eq!(derivation.external_count(), 2);
    let report = derivation.report();
    assert!(report.contains(">=1.2,<2.0"), "report was: {report}");
    assert!(report.contains(">=2.0,<3.0"), "report was: {report}");
    assert!(report.ends_with("version solving failed."));
}

#[test]
fn missing_versions_are_explained() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("demo", v("1.0.0")));

    let root = root_with(vec![req("demo", "^2.0")]);
    let err = resolve(&root, &provider, &ResolveOptions::default()).unwrap_err();

    let ResolveError::Unsatisfiable { derivation } = err else {
        panic!("expected an unsatisfiable failure, got {err}");
    };
    assert!(derivation.report().contains("no versions of demo match"));
}

#[test]
fn vcs_pins_skip_registry_enumeration() {
    let pendulum_source = Source::Vcs {
        kind: VcsKind::Git,
        url: "https://github.com/sdispater/pendulum.git".to_string(),
        reference: VcsReference::Branch("2.0".to_string()),
    };
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("cleo", v("0.6.0")));
    provider.add_package(Package::new("cleo", v("0.6.5")));
    provider.add_package(Package::new("cleo", v("0.7.0")));
    provider.add_pinned(Package::new("pendulum", v("2.0.0")).with_source(pendulum_source.clone()));

    let pendulum = Requirement::vcs(
        "pendulum",
        VcsKind::Git,
        "https://github.com/sdispater/pendulum.git",
        VcsReference::Branch("2.0".to_string()),
    );
    let root = root_with(vec![req("cleo", "^0.6"), pendulum]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();

    // Newest cleo within >=0.6,<0.7, not 0.7.0.
    assert_eq!(resolution.package("cleo").unwrap().version, v("0.6.5"));

    let pendulum = resolution.package("pendulum").unwrap();
    assert_eq!(pendulum.version, v("2.0.0"));
    assert_eq!(
        pendulum.source_identity().unwrap(),
        "git+https://github.com/sdispater/pendulum.git@2.0"
    );
    assert!(!provider.queried_registry("pendulum"));
}

#[test]
fn marker_false_requirements_are_absent_for_that_environment() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("functools32", v("3.2.3")));
    provider.add_package(Package::new("cleo", v("0.6.5")));

    let functools32 = req("functools32", "^3.2.3").with_marker(
        Marker::parse(
            "python_version ~= \"2.7\" and sys_platform == \"win32\" or python_version in \"3.4 3.5\"",
        )
        .unwrap(),
    );
    let root = root_with(vec![req("cleo", "^0.6"), functools32.clone()]);

    let py36 = Environment {
        python_version: "3.6".to_string(),
        sys_platform: "linux".to_string(),
        ..Environment::default()
    };
    let options = ResolveOptions {
        environment: Some(py36),
        ..ResolveOptions::default()
    };
    let resolution = resolve(&root, &provider, &options).unwrap();
    assert!(!resolution.contains("functools32"));
    assert!(resolution.contains("cleo"));

    // Under windows python 2.7 the marker holds and the package is selected.
    let py27_win = Environment {
        python_version: "2.7".to_string(),
        sys_platform: "win32".to_string(),
        ..Environment::default()
    };
    let options = ResolveOptions {
        environment: Some(py27_win),
        ..ResolveOptions::default()
    };
    let resolution = resolve(&root, &provider, &options).unwrap();
    assert!(resolution.contains("functools32"));
}

#[test]
fn extras_pull_exactly_their_mapped_subset() {
    let mut provider = MemoryProvider::new();
    provider.add_package(
        Package::new("requests", v("2.18.4"))
            .with_requirement(req("idna", ">=2.5,<2.7"))
            .with_requirement(req("cryptography", ">=1.3.4").with_optional(true))
            .with_requirement(req("pyopenssl", ">=0.14").with_optional(true))
            .with_extra("security", ["cryptography", "pyopenssl"]),
    );
    provider.add_package(Package::new("idna", v("2.6.0")));
    provider.add_package(Package::new("cryptography", v("2.1.4")));
    provider.add_package(Package::new("pyopenssl", v("17.5.0")));

    // Without the extra the optional requirements stay absent.
    let root = root_with(vec![req("requests", "^2.18")]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();
    assert!(resolution.contains("idna"));
    assert!(!resolution.contains("cryptography"));
    assert!(!resolution.contains("pyopenssl"));

    // With it, exactly the mapped subset appears.
    let root = root_with(vec![req("requests", "^2.18").with_extras(["security"])]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();
    assert!(resolution.contains("cryptography"));
    assert!(resolution.contains("pyopenssl"));
    let requests = resolution.package("requests").unwrap();
    assert_eq!(
        requests.extras,
        BTreeSet::from(["security".to_string()])
    );
}

#[test]
fn unknown_extras_fail_at_resolution_time() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("requests", v("2.18.4")));

    let root = root_with(vec![req("requests", "^2.18").with_extras(["bogus"])]);
    let err = resolve(&root, &provider, &ResolveOptions::default()).unwrap_err();
    match err {
        ResolveError::UnknownExtra { package, extra } => {
            assert_eq!(package, "requests");
            assert_eq!(extra, "bogus");
        }
        other => panic!("expected an unknown-extra failure, got {other}"),
    }
}

#[test]
fn disjoint_marker_variants_coexist() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("pathlib2", v("2.2.0")));
    provider.add_package(Package::new("pathlib2", v("2.3.5")));

    let py2 = req("pathlib2", "~2.2")
        .with_marker(Marker::parse("python_version < \"3.0\"").unwrap());
    let py3 = req("pathlib2", "~2.3")
        .with_marker(Marker::parse("python_version >= \"3.0\"").unwrap());
    let root = root_with(vec![py2, py3]);

    // Without a concrete environment both variants resolve, each in its own
    // marker partition.
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();
    let variants = resolution.packages_named("pathlib2");
    assert_eq!(variants.len(), 2);
    let versions: Vec<&Version> = variants.iter().map(|p| &p.version).collect();
    assert!(versions.contains(&&v("2.2.0")));
    assert!(versions.contains(&&v("2.3.5")));
    assert!(resolution.warnings.is_empty(), "{:?}", resolution.warnings);

    // With a concrete environment only the matching variant survives.
    let py27 = Environment {
        python_version: "2.7".to_string(),
        ..Environment::default()
    };
    let options = ResolveOptions {
        environment: Some(py27),
        ..ResolveOptions::default()
    };
    let resolution = resolve(&root, &provider, &options).unwrap();
    let variants = resolution.packages_named("pathlib2");
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].version, v("2.2.0"));
}

#[test]
fn marker_gaps_are_flagged_not_silently_unresolved() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("pathlib2", v("2.2.0")));
    provider.add_package(Package::new("pathlib2", v("2.3.5")));

    let py2 = req("pathlib2", "~2.2")
        .with_marker(Marker::parse("python_version < \"3.0\"").unwrap());
    let py36_plus = req("pathlib2", "~2.3")
        .with_marker(Marker::parse("python_version >= \"3.6\"").unwrap());
    let root = root_with(vec![py2, py36_plus]);

    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();
    assert!(
        resolution
            .warnings
            .iter()
            .any(|w| w.contains("marker gap")),
        "{:?}",
        resolution.warnings
    );
}

#[test]
fn provider_failures_name_the_package() {
    let provider = MemoryProvider::new();
    let root = root_with(vec![req("ghost", "^1.0")]);
    let err = resolve(&root, &provider, &ResolveOptions::default()).unwrap_err();
    match err {
        ResolveError::Provider(e) => assert_eq!(e.package, "ghost"),
        other => panic!("expected a provider failure, got {other}"),
    }
}

#[test]
fn step_budget_exhaustion_is_a_timeout_not_unsatisfiable() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("demo", v("1.0.0")));

    let root = root_with(vec![req("demo", "^1.0")]);
    let options = ResolveOptions {
        max_steps: 0,
        ..ResolveOptions::default()
    };
    let err = resolve(&root, &provider, &options).unwrap_err();
    assert!(matches!(err, ResolveError::Timeout { .. }), "got {err}");
}

#[test]
fn cancellation_is_cooperative() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("demo", v("1.0.0")));

    let token = CancelToken::new();
    token.cancel();
    let root = root_with(vec![req("demo", "^1.0")]);
    let options = ResolveOptions {
        cancel: Some(token),
        ..ResolveOptions::default()
    };
    let err = resolve(&root, &provider, &options).unwrap_err();
    assert!(matches!(err, ResolveError::Cancelled), "got {err}");
}

#[test]
fn dev_dependencies_are_categorized() {
    use accord_core::Category;

    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("cleo", v("0.6.5")));
    provider.add_package(Package::new("pytest", v("3.5.0")).with_requirement(req("py", "^1.5")));
    provider.add_package(Package::new("py", v("1.5.2")));

    let root = root_with(vec![
        req("cleo", "^0.6"),
        req("pytest", "^3.5").with_category(Category::Dev),
    ]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();

    assert_eq!(resolution.package("cleo").unwrap().category, Category::Main);
    assert_eq!(resolution.package("pytest").unwrap().category, Category::Dev);
    // Only reachable through a dev dependency.
    assert_eq!(resolution.package("py").unwrap().category, Category::Dev);

    let tree = resolution.graph.print_tree(None);
    assert!(tree.contains("[dev-dependencies]"));
}

#[test]
fn prereleases_require_opt_in() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("demo", v("1.0.0")));
    provider.add_package(Package::new("demo", v("1.1.0-rc.1")));

    let root = root_with(vec![req("demo", "^1.0")]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();
    assert_eq!(resolution.package("demo").unwrap().version, v("1.0.0"));

    let root = root_with(vec![req("demo", "^1.0").with_prereleases(true)]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();
    assert_eq!(
        resolution.package("demo").unwrap().version,
        v("1.1.0-rc.1")
    );
}

#[test]
fn graph_records_resolved_edges() {
    let mut provider = MemoryProvider::new();
    provider.add_package(Package::new("cleo", v("0.6.5")).with_requirement(req("pastel", "^0.1")));
    provider.add_package(Package::new("pastel", v("0.1.1")));

    let root = root_with(vec![req("cleo", "^0.6")]);
    let resolution = resolve(&root, &provider, &ResolveOptions::default()).unwrap();

    let path = resolution.graph.find_path("pastel").unwrap();
    let names: Vec<&str> = path.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["my-package", "cleo", "pastel"]);

    let cleo = resolution.package("cleo").unwrap();
    assert_eq!(cleo.dependencies.len(), 1);
    assert_eq!(cleo.dependencies[0].name, "pastel");
}
