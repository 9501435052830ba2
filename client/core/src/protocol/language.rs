//! Wire Language Enum
//!
//! The service identifies document languages by a fixed integer enum. The
//! editor reports a language id string ("python", "cpp", ...); unknown ids
//! fall back to [`Language::Unspecified`].

use serde::{Serialize, Serializer};

/// Document language as the service's wire enum
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum Language {
    #[default]
    Unspecified = 0,
    C = 1,
    Clojure = 2,
    CoffeeScript = 3,
    Cpp = 4,
    CSharp = 5,
    Css = 6,
    CudaCpp = 7,
    Dockerfile = 8,
    Go = 9,
    Groovy = 10,
    Handlebars = 11,
    Haskell = 12,
    Hcl = 13,
    Html = 14,
    Ini = 15,
    Java = 16,
    JavaScript = 17,
    Json = 18,
    Julia = 19,
    Kotlin = 20,
    Latex = 21,
    Less = 22,
    Lua = 23,
    Makefile = 24,
    Markdown = 25,
    ObjectiveC = 26,
    ObjectiveCpp = 27,
    Perl = 28,
    Php = 29,
    PlainText = 30,
    Protobuf = 31,
    Pbtxt = 32,
    Python = 33,
    R = 34,
    Ruby = 35,
    Rust = 36,
    Sass = 37,
    Scala = 38,
    Scss = 39,
    Shell = 40,
    Sql = 41,
    Starlark = 42,
    Swift = 43,
    TypeScriptReact = 44,
    TypeScript = 45,
    VisualBasic = 46,
    Vue = 47,
    Xml = 48,
    Xsl = 49,
    Yaml = 50,
    Svelte = 51,
}

impl Language {
    /// The wire integer for this language
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Map an editor language id to the wire enum
    ///
    /// Ids follow the LSP-style identifiers the editor reports. Unknown ids
    /// map to [`Language::Unspecified`].
    #[must_use]
    pub fn from_editor_language(id: &str) -> Self {
        match id {
            "c" => Self::C,
            "clojure" => Self::Clojure,
            "coffeescript" => Self::CoffeeScript,
            "cpp" => Self::Cpp,
            "csharp" => Self::CSharp,
            "css" => Self::Css,
            "cudacpp" => Self::CudaCpp,
            "dockerfile" => Self::Dockerfile,
            "go" => Self::Go,
            "groovy" => Self::Groovy,
            "handlebars" => Self::Handlebars,
            "haskell" => Self::Haskell,
            "hcl" => Self::Hcl,
            "html" => Self::Html,
            "ini" => Self::Ini,
            "java" => Self::Java,
            "javascript" => Self::JavaScript,
            "json" => Self::Json,
            "julia" => Self::Julia,
            "kotlin" => Self::Kotlin,
            "latex" => Self::Latex,
            "less" => Self::Less,
            "lua" => Self::Lua,
            "makefile" => Self::Makefile,
            "markdown" => Self::Markdown,
            "objective-c" | "objectivec" => Self::ObjectiveC,
            "objective-cpp" | "objectivecpp" => Self::ObjectiveCpp,
            "perl" => Self::Perl,
            "php" => Self::Php,
            "plaintext" => Self::PlainText,
            "protobuf" => Self::Protobuf,
            "pbtxt" => Self::Pbtxt,
            "python" => Self::Python,
            "r" => Self::R,
            "ruby" => Self::Ruby,
            "rust" => Self::Rust,
            "sass" => Self::Sass,
            "scala" => Self::Scala,
            "scss" => Self::Scss,
            "shell" | "shellscript" | "bash" => Self::Shell,
            "sql" => Self::Sql,
            "starlark" => Self::Starlark,
            "swift" => Self::Swift,
            "typescriptreact" => Self::TypeScriptReact,
            "typescript" => Self::TypeScript,
            "visualbasic" | "vb" => Self::VisualBasic,
            "vue" => Self::Vue,
            "xml" => Self::Xml,
            "xsl" => Self::Xsl,
            "yaml" => Self::Yaml,
            "svelte" => Self::Svelte,
            _ => Self::Unspecified,
        }
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}
