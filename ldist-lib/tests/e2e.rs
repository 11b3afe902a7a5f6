//! End-to-end tests driving the public `operations` entry points against a
//! local, binary-rockspec fixture repository. Binary rockspecs (those with a
//! non-empty `files` list) skip the CMake configure/build/install steps
//! entirely, so these tests exercise the full resolve → fetch → install →
//! pack → remove pipeline without needing a CMake toolchain on the runner.

use std::fs;
use std::path::Path;

use ldist_lib::config::{Config, OperationContext};
use ldist_lib::package::PackageRef;

/// Writes one binary-rockspec package into `repo_root/<name>/`, so that
/// `download_manifest`'s local-repository scan (one directory per package)
/// picks it up.
fn write_binary_package(repo_root: &Path, name: &str, version: &str, deps: &[&str], file_contents: &[(&str, &str)]) {
    let pkg_dir = repo_root.join(name);
    fs::create_dir_all(&pkg_dir).unwrap();

    let deps_lua = deps
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let files_lua = file_contents
        .iter()
        .map(|(f, _)| format!("\"{f}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let rockspec = format!(
        "package = \"{name}\"\nversion = \"{version}\"\ndependencies = {{{deps_lua}}}\nfiles = {{{files_lua}}}\n"
    );
    fs::write(pkg_dir.join(format!("{name}-{version}.rockspec")), rockspec).unwrap();

    for (file, contents) in file_contents {
        fs::write(pkg_dir.join(file), contents).unwrap();
    }
}

fn test_config(root_dir: &Path, temp_dir: &Path, repo: &Path) -> Config {
    Config::builder()
        .root_dir(root_dir.to_path_buf())
        .temp_dir(temp_dir.to_path_buf())
        .manifest_repos(vec![repo.to_string_lossy().into_owned()])
        .include_local_repos(true)
        .build()
}

/// Scenario 1: empty root, `install "xml 1.8.0-1"`; the manifest declares
/// `xml` depending on `lua >= 5.1` with a single `lua` version available.
/// The installed set ends up `[lua, xml]` (dependency-first) and both
/// packages' files land under the deploy root.
#[test]
fn install_resolves_and_installs_dependency_first() {
    let root = tempdir::TempDir::new("ldist-e2e-root").unwrap();
    let temp = tempdir::TempDir::new("ldist-e2e-temp").unwrap();
    let repo = tempdir::TempDir::new("ldist-e2e-repo").unwrap();

    write_binary_package(repo.path(), "lua", "5.3.4", &[], &[("lua.bin", "lua-binary")]);
    write_binary_package(
        repo.path(),
        "xml",
        "1.8.0-1",
        &["lua >= 5.1"],
        &[("xml.so", "xml-binary")],
    );

    let config = test_config(root.path(), temp.path(), repo.path());
    let mut ctx = OperationContext::new(config);

    let target: PackageRef = "xml 1.8.0-1".parse().unwrap();
    let installed = ldist_lib::operations::install(&mut ctx, &[target]).unwrap();

    let names: Vec<_> = installed.iter().map(|p| p.name.as_str().to_string()).collect();
    assert_eq!(names, vec!["lua".to_string(), "xml".to_string()]);

    assert!(root.path().join("lua.bin").exists());
    assert!(root.path().join("xml.so").exists());

    let listed = ldist_lib::operations::list(&ctx).unwrap();
    let listed_names: Vec<_> = listed.iter().map(|p| p.name.as_str().to_string()).collect();
    assert_eq!(listed_names, vec!["lua".to_string(), "xml".to_string()]);
}

/// Scenario 2: a root with `lua 5.1.5` already installed; installing `x`,
/// which depends on `lua >= 5.3`, fails with a resolve error (no fallback
/// runs because `lua` is already installed).
#[test]
fn install_fails_without_fallback_when_lua_already_installed() {
    let root = tempdir::TempDir::new("ldist-e2e-root2").unwrap();
    let temp = tempdir::TempDir::new("ldist-e2e-temp2").unwrap();
    let repo = tempdir::TempDir::new("ldist-e2e-repo2").unwrap();

    write_binary_package(repo.path(), "lua", "5.1.5", &[], &[("lua.bin", "lua-binary")]);
    write_binary_package(repo.path(), "x", "1.0", &["lua >= 5.3"], &[("x.so", "x-binary")]);

    let config = test_config(root.path(), temp.path(), repo.path());
    let mut ctx = OperationContext::new(config);

    // Pre-install lua 5.1.5 directly.
    let lua_target: PackageRef = "lua 5.1.5".parse().unwrap();
    ldist_lib::operations::install(&mut ctx, &[lua_target]).unwrap();

    let x_target: PackageRef = "x".parse().unwrap();
    let err = ldist_lib::operations::install(&mut ctx, &[x_target]).unwrap_err();
    assert!(matches!(err, ldist_lib::LdistError::Resolve(_)));
}

/// Scenario 3: empty root, `install "y"` where `y` depends on
/// `lua == 5.2.*` and the manifest offers `lua 5.3.4, 5.2.4, 5.1.5`; the
/// fallback strategy tries 5.3.4 (fails), then 5.2.4 (succeeds).
#[test]
fn install_lua_fallback_finds_matching_version() {
    let root = tempdir::TempDir::new("ldist-e2e-root3").unwrap();
    let temp = tempdir::TempDir::new("ldist-e2e-temp3").unwrap();
    let repo = tempdir::TempDir::new("ldist-e2e-repo3").unwrap();

    write_binary_package(repo.path(), "y", "1.0", &["lua == 5.2.*"], &[("y.so", "y-binary")]);

    // Each `lua` version needs its own package subdirectory for the local
    // manifest scan, since it holds one rockspec per directory.
    for (version, dirname) in [("5.3.4", "lua-534"), ("5.2.4", "lua-524"), ("5.1.5", "lua-515")] {
        let dir = repo.path().join(dirname);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("lua-{version}.rockspec")),
            format!("package = \"lua\"\nversion = \"{version}\"\nfiles = {{\"lua.bin\"}}\n"),
        )
        .unwrap();
        fs::write(dir.join("lua.bin"), format!("lua-{version}")).unwrap();
    }

    let config = test_config(root.path(), temp.path(), repo.path());
    let mut ctx = OperationContext::new(config);

    let target: PackageRef = "y".parse().unwrap();
    let installed = ldist_lib::operations::install(&mut ctx, &[target]).unwrap();

    let lua = installed.iter().find(|p| p.name.as_str() == "lua").unwrap();
    assert_eq!(lua.version.to_string(), "5.2.4");
}

/// Scenario 4: `install "xml"` succeeds, then `pack "xml" .` produces a
/// directory named `xml <version>_<hex>` whose rockspec's `version` field
/// matches the directory suffix and whose dependency on `lua` is loosened
/// to `~> 5.3`.
#[test]
fn pack_exports_hashed_version_with_loosened_dependency() {
    let root = tempdir::TempDir::new("ldist-e2e-root4").unwrap();
    let temp = tempdir::TempDir::new("ldist-e2e-temp4").unwrap();
    let repo = tempdir::TempDir::new("ldist-e2e-repo4").unwrap();
    let dest = tempdir::TempDir::new("ldist-e2e-dest4").unwrap();

    write_binary_package(repo.path(), "lua", "5.3.4", &[], &[("lua.bin", "lua-binary")]);
    write_binary_package(
        repo.path(),
        "xml",
        "1.8.0-1",
        &["lua >= 5.1"],
        &[("xml.so", "xml-binary")],
    );

    let config = test_config(root.path(), temp.path(), repo.path());
    let mut ctx = OperationContext::new(config);

    let target: PackageRef = "xml".parse().unwrap();
    ldist_lib::operations::install(&mut ctx, &[target]).unwrap();

    let name = ldist_lib::package::PackageName::new("xml").unwrap();
    let export_dir = ldist_lib::operations::pack(&mut ctx, &name, dest.path()).unwrap();

    let dir_name = export_dir.file_name().unwrap().to_string_lossy().into_owned();
    assert!(dir_name.starts_with("xml 1.8.0-1_"), "unexpected export dir name: {dir_name}");
    let hash_suffix = dir_name.strip_prefix("xml 1.8.0-1_").unwrap();
    assert_eq!(hash_suffix.len(), 64, "dep hash should be a 64-char hex SHA-256");

    let rockspec_files: Vec<_> = fs::read_dir(&export_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rockspec"))
        .collect();
    assert_eq!(rockspec_files.len(), 1);
    let rockspec_text = fs::read_to_string(rockspec_files[0].path()).unwrap();
    assert!(rockspec_text.contains(&format!("version = \"1.8.0-1_{hash_suffix}\"")));
    assert!(rockspec_text.contains("\"lua ~> 5.3\""));
}

/// Scenario 5: two local repositories both declare `xml 1.0` with different
/// dependency sets; after the merge, the first repository's entry wins.
#[test]
fn manifest_merge_first_repo_wins_on_collision() {
    let temp = tempdir::TempDir::new("ldist-e2e-temp5").unwrap();
    let repo_a = tempdir::TempDir::new("ldist-e2e-repo5a").unwrap();
    let repo_b = tempdir::TempDir::new("ldist-e2e-repo5b").unwrap();

    write_binary_package(repo_a.path(), "xml", "1.0", &["lua >= 5.1"], &[("xml.so", "a")]);
    write_binary_package(repo_b.path(), "xml", "1.0", &["lua >= 5.3"], &[("xml.so", "b")]);

    let manifest = ldist_lib::manifest::download_manifest(
        &[
            repo_a.path().to_string_lossy().into_owned(),
            repo_b.path().to_string_lossy().into_owned(),
        ],
        "manifest",
        true,
        temp.path(),
    )
    .unwrap();

    let name = ldist_lib::package::PackageName::new("xml").unwrap();
    let info = manifest.versions(&name).next().unwrap();
    assert_eq!(info.local_url, Some(repo_a.path().join("xml")));
}

/// Scenario 6: `make` in a directory containing two rockspecs installs the
/// alphabetically-first one and logs a warning naming the rest.
#[test]
fn make_picks_alphabetically_first_rockspec_and_warns_about_rest() {
    let root = tempdir::TempDir::new("ldist-e2e-root6").unwrap();
    let temp = tempdir::TempDir::new("ldist-e2e-temp6").unwrap();
    let repo = tempdir::TempDir::new("ldist-e2e-repo6").unwrap();
    let working_dir = tempdir::TempDir::new("ldist-e2e-working6").unwrap();

    fs::write(
        working_dir.path().join("bar-0.1.rockspec"),
        "package = \"bar\"\nversion = \"0.1\"\nfiles = {\"bar.so\"}\n",
    )
    .unwrap();
    fs::write(working_dir.path().join("bar.so"), "bar-binary").unwrap();
    fs::write(
        working_dir.path().join("foo-1.0.rockspec"),
        "package = \"foo\"\nversion = \"1.0\"\nfiles = {\"foo.so\"}\n",
    )
    .unwrap();
    fs::write(working_dir.path().join("foo.so"), "foo-binary").unwrap();

    let config = test_config(root.path(), temp.path(), repo.path());
    let mut ctx = OperationContext::new(config);

    let installed = ldist_lib::operations::make(&mut ctx, working_dir.path()).unwrap();
    assert_eq!(installed.name.as_str(), "bar");
    assert!(ctx
        .report
        .entries()
        .iter()
        .any(|e| e.detail.contains("foo-1.0.rockspec")));
}

/// `install(X); install(X)` is a no-op the second time: the installed set
/// is unchanged and no new package records are produced.
#[test]
fn install_is_idempotent() {
    let root = tempdir::TempDir::new("ldist-e2e-root7").unwrap();
    let temp = tempdir::TempDir::new("ldist-e2e-temp7").unwrap();
    let repo = tempdir::TempDir::new("ldist-e2e-repo7").unwrap();

    write_binary_package(repo.path(), "lua", "5.3.4", &[], &[("lua.bin", "lua-binary")]);

    let config = test_config(root.path(), temp.path(), repo.path());
    let mut ctx = OperationContext::new(config);

    let target: PackageRef = "lua".parse().unwrap();
    let first = ldist_lib::operations::install(&mut ctx, &[target.clone()]).unwrap();
    assert_eq!(first.len(), 1);

    let second = ldist_lib::operations::install(&mut ctx, &[target]).unwrap();
    assert!(second.is_empty(), "re-installing an already-satisfied target should add nothing");

    let listed = ldist_lib::operations::list(&ctx).unwrap();
    assert_eq!(listed.len(), 1);
}

/// `install(X); remove(X)` restores the installed set to empty and deletes
/// every file `X` owned, since nothing else references them.
#[test]
fn remove_round_trip_restores_empty_set_and_deletes_files() {
    let root = tempdir::TempDir::new("ldist-e2e-root8").unwrap();
    let temp = tempdir::TempDir::new("ldist-e2e-temp8").unwrap();
    let repo = tempdir::TempDir::new("ldist-e2e-repo8").unwrap();

    write_binary_package(repo.path(), "xml", "1.8.0-1", &[], &[("xml.so", "xml-binary")]);

    let config = test_config(root.path(), temp.path(), repo.path());
    let mut ctx = OperationContext::new(config);

    let target: PackageRef = "xml".parse().unwrap();
    ldist_lib::operations::install(&mut ctx, &[target]).unwrap();
    assert!(root.path().join("xml.so").exists());

    let name = ldist_lib::package::PackageName::new("xml").unwrap();
    ldist_lib::operations::remove(&mut ctx, &[name]).unwrap();

    assert!(!root.path().join("xml.so").exists());
    let listed = ldist_lib::operations::list(&ctx).unwrap();
    assert!(listed.is_empty());
}
