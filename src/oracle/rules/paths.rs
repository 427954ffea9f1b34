//! Path-level routing: which rule family judges a file.

use phf::{phf_map, phf_set};

use crate::diff::FileChange;

/// The rule family a file is judged by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Test sources, fixtures and snapshots. Always disqualifying.
    Test,
    /// Configuration, CI, build and infrastructure files. Always disqualifying.
    Config,
    /// Dependency manifest (package.json, Cargo.toml, ...)
    Manifest,
    /// Dependency lockfile
    Lockfile,
    /// Translation resources
    Locale,
    /// Stylesheets
    Stylesheet,
    /// Prose documentation
    Docs,
    /// Everything else: program source
    Source,
}

static LOCKFILES: phf::Set<&'static str> = phf_set! {
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lock",
    "cargo.lock",
    "gemfile.lock",
    "composer.lock",
    "poetry.lock",
    "pipfile.lock",
    "uv.lock",
    "go.sum",
    "pubspec.lock",
    "mix.lock",
    "packages.lock.json",
};

static MANIFESTS: phf::Set<&'static str> = phf_set! {
    "package.json",
    "composer.json",
    "cargo.toml",
    "pyproject.toml",
    "pipfile",
    "gemfile",
    "go.mod",
    "pubspec.yaml",
    "mix.exs",
};

/// Config file names matched exactly (lowercased).
static CONFIG_FILES: phf::Set<&'static str> = phf_set! {
    "dockerfile",
    "makefile",
    "procfile",
    "jenkinsfile",
    "vagrantfile",
    "tsconfig.json",
    "jsconfig.json",
    "babel.config.js",
    "webpack.config.js",
    "vite.config.ts",
    "vite.config.js",
    "next.config.js",
    "jest.config.js",
    "rollup.config.js",
    "build.rs",
    "setup.py",
    "setup.cfg",
    "build.gradle",
    "settings.gradle",
    "pom.xml",
    "rust-toolchain",
    "rust-toolchain.toml",
    ".nvmrc",
    ".node-version",
    ".python-version",
    ".tool-versions",
    ".gitignore",
    ".gitattributes",
    ".npmrc",
    ".editorconfig",
    "codeowners",
    "cmakelists.txt",
};

/// Extension-less prose files.
static DOC_FILES: phf::Set<&'static str> = phf_set! {
    "readme",
    "license",
    "licence",
    "changelog",
    "authors",
    "contributors",
    "notice",
    "contributing",
};

static EXTENSIONS: phf::Map<&'static str, PathKind> = phf_map! {
    "css" => PathKind::Stylesheet,
    "scss" => PathKind::Stylesheet,
    "sass" => PathKind::Stylesheet,
    "less" => PathKind::Stylesheet,
    "styl" => PathKind::Stylesheet,
    "pcss" => PathKind::Stylesheet,
    "md" => PathKind::Docs,
    "mdx" => PathKind::Docs,
    "markdown" => PathKind::Docs,
    "rst" => PathKind::Docs,
    "adoc" => PathKind::Docs,
    "txt" => PathKind::Docs,
    "po" => PathKind::Locale,
    "pot" => PathKind::Locale,
    "xliff" => PathKind::Locale,
    "xlf" => PathKind::Locale,
    "arb" => PathKind::Locale,
    "ftl" => PathKind::Locale,
    "yml" => PathKind::Config,
    "yaml" => PathKind::Config,
    "toml" => PathKind::Config,
    "ini" => PathKind::Config,
    "cfg" => PathKind::Config,
    "conf" => PathKind::Config,
    "env" => PathKind::Config,
    "properties" => PathKind::Config,
    "tf" => PathKind::Config,
    "tfvars" => PathKind::Config,
    "hcl" => PathKind::Config,
    "nix" => PathKind::Config,
    "json" => PathKind::Config,
    "xml" => PathKind::Config,
    "plist" => PathKind::Config,
    "lock" => PathKind::Lockfile,
};

/// Directory names that mark translation resources.
const LOCALE_DIRS: &[&str] = &[
    "locales",
    "locale",
    "i18n",
    "l10n",
    "lang",
    "langs",
    "translations",
];

const TEST_DIRS: &[&str] = &[
    "test",
    "tests",
    "__tests__",
    "__mocks__",
    "__snapshots__",
    "spec",
    "specs",
    "e2e",
    "fixtures",
    "testdata",
];

const CONFIG_DIRS: &[&str] = &[".github", ".circleci", ".gitlab", ".husky", ".vscode", "deploy"];

/// Route a file to its rule family.
pub fn path_kind(file: &FileChange) -> PathKind {
    let path = file.path.to_ascii_lowercase();
    let segments: Vec<&str> = path.split('/').collect();
    let (dirs, name) = segments.split_at(segments.len().saturating_sub(1));
    let name = name.first().copied().unwrap_or("");

    if is_test_file(dirs, name) {
        return PathKind::Test;
    }
    if LOCKFILES.contains(name) {
        return PathKind::Lockfile;
    }
    if MANIFESTS.contains(name) || is_requirements_file(name) {
        return PathKind::Manifest;
    }
    if dirs.iter().any(|d| CONFIG_DIRS.contains(d))
        || CONFIG_FILES.contains(name)
        || name.starts_with(".env")
        || name.starts_with(".eslintrc")
        || name.starts_with(".prettierrc")
        || name.starts_with("docker-compose")
    {
        return PathKind::Config;
    }

    let ext = file.extension();
    let by_ext = ext.as_deref().and_then(|e| EXTENSIONS.get(e).copied());

    let in_locale_dir = dirs.iter().any(|d| LOCALE_DIRS.contains(d));
    if by_ext == Some(PathKind::Locale)
        || (in_locale_dir && matches!(ext.as_deref(), Some("json" | "yml" | "yaml" | "properties" | "toml")))
        || is_language_code_file(name)
    {
        return PathKind::Locale;
    }

    if by_ext.is_none() && DOC_FILES.contains(name) {
        return PathKind::Docs;
    }
    by_ext.unwrap_or(PathKind::Source)
}

fn is_test_file(dirs: &[&str], name: &str) -> bool {
    if dirs.iter().any(|d| TEST_DIRS.contains(d)) {
        return true;
    }
    let stem = name.split('.').next().unwrap_or(name);
    name.contains(".test.")
        || name.contains(".spec.")
        || name.ends_with(".snap")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || stem.starts_with("test_")
        || (name.ends_with(".java") && stem.len() > 4 && stem.ends_with("test"))
}

fn is_requirements_file(name: &str) -> bool {
    name.starts_with("requirements") && name.ends_with(".txt")
}

/// `en.json`, `pt-BR.yml`, `zh_hans.json`, ...
fn is_language_code_file(name: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if !matches!(ext, "json" | "yml" | "yaml") {
        return false;
    }
    let mut parts = stem.splitn(2, ['-', '_']);
    let lang = parts.next().unwrap_or("");
    let region = parts.next();
    lang.len() == 2
        && lang.chars().all(|c| c.is_ascii_alphabetic())
        && region.is_none_or(|r| (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Extensions whose line comments start with `#`.
pub fn uses_hash_comments(file: &FileChange) -> bool {
    matches!(
        file.extension().as_deref(),
        Some("py" | "rb" | "sh" | "bash" | "zsh" | "pl" | "r" | "ex" | "exs" | "cr" | "nim" | "toml" | "yml" | "yaml" | "coffee")
    )
}

/// JS-family sources where formatters add or drop statement semicolons.
pub fn has_optional_semicolons(file: &FileChange) -> bool {
    matches!(
        file.extension().as_deref(),
        Some("js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "mts" | "cts" | "vue" | "svelte")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(path: &str) -> PathKind {
        path_kind(&FileChange::new(path, "modified", 1, 1, None))
    }

    #[test]
    fn test_test_files() {
        assert_eq!(kind("src/__tests__/math.js"), PathKind::Test);
        assert_eq!(kind("src/math.test.ts"), PathKind::Test);
        assert_eq!(kind("pkg/server_test.go"), PathKind::Test);
        assert_eq!(kind("tests/test_api.py"), PathKind::Test);
        assert_eq!(kind("src/UserServiceTest.java"), PathKind::Test);
        assert_eq!(kind("src/latest.js"), PathKind::Source);
    }

    #[test]
    fn test_dependency_files() {
        assert_eq!(kind("package.json"), PathKind::Manifest);
        assert_eq!(kind("packages/web/package.json"), PathKind::Manifest);
        assert_eq!(kind("requirements-dev.txt"), PathKind::Manifest);
        assert_eq!(kind("package-lock.json"), PathKind::Lockfile);
        assert_eq!(kind("Cargo.lock"), PathKind::Lockfile);
        assert_eq!(kind("go.sum"), PathKind::Lockfile);
    }

    #[test]
    fn test_config_files() {
        assert_eq!(kind(".github/workflows/ci.yml"), PathKind::Config);
        assert_eq!(kind(".env.production"), PathKind::Config);
        assert_eq!(kind("Dockerfile"), PathKind::Config);
        assert_eq!(kind("tsconfig.json"), PathKind::Config);
        assert_eq!(kind("config/settings.yaml"), PathKind::Config);
    }

    #[test]
    fn test_locale_files() {
        assert_eq!(kind("public/locales/en/common.json"), PathKind::Locale);
        assert_eq!(kind("src/i18n/fr.yml"), PathKind::Locale);
        assert_eq!(kind("messages/pt-BR.json"), PathKind::Locale);
        assert_eq!(kind("po/de.po"), PathKind::Locale);
    }

    #[test]
    fn test_other_kinds() {
        assert_eq!(kind("src/styles/button.scss"), PathKind::Stylesheet);
        assert_eq!(kind("README.md"), PathKind::Docs);
        assert_eq!(kind("LICENSE"), PathKind::Docs);
        assert_eq!(kind("CMakeLists.txt"), PathKind::Config);
        assert_eq!(kind("src/app.tsx"), PathKind::Source);
        assert_eq!(kind("lib/core.rs"), PathKind::Source);
    }
}
