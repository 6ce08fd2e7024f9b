//! Per-track term dictionaries
//!
//! Maps canonical concept keys (e.g. `loop`) to the surface forms learners
//! and assistants actually write (`for`, `while`, `循环`, ...). Pure data.

use std::sync::LazyLock;

use crate::content::Track;

/// A concept key and its surface-form synonyms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    pub key: String,
    pub surfaces: Vec<String>,
}

impl Concept {
    /// Whether `term` is the key or one of the surfaces (case-insensitive).
    fn names(&self, term: &str) -> bool {
        self.key.eq_ignore_ascii_case(term)
            || self.surfaces.iter().any(|s| s.to_lowercase() == term)
    }
}

/// Static mapping from concept keys to surface forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermDictionary {
    concepts: Vec<Concept>,
}

const JAVASCRIPT_TERMS: &[(&str, &[&str])] = &[
    ("variable", &["变量", "var", "let", "const", "变量声明", "变量定义"]),
    ("datatype", &["数据类型", "string", "number", "boolean", "undefined", "null", "类型"]),
    ("operator", &["运算符", "操作符", "运算"]),
    ("conditional", &["条件", "if", "else", "switch", "条件语句", "判断", "分支"]),
    ("loop", &["循环", "for", "while", "do-while", "遍历", "迭代"]),
    ("function", &["函数", "function", "方法", "method", "函数定义", "函数声明"]),
    ("dom", &["DOM", "DOM树", "文档对象模型", "document"]),
    ("element", &["元素", "element", "querySelector", "getElementById", "选择器", "节点"]),
    ("event", &["事件", "event", "addEventListener", "事件监听", "事件处理", "click", "点击"]),
    ("style", &["样式", "style", "CSS", "classList", "类名", "className"]),
    ("async", &["异步", "async", "asynchronous", "异步编程", "非阻塞"]),
    ("callback", &["回调", "callback", "回调函数", "回调地狱"]),
    ("promise", &["Promise", "承诺", "then", "catch", "resolve", "reject"]),
    ("await", &["await", "async/await", "等待", "异步等待"]),
    ("fetch", &["fetch", "ajax", "http", "网络请求", "API调用", "数据获取"]),
    ("object", &["对象", "object", "对象字面量", "属性", "property"]),
    ("this", &["this", "this关键字", "上下文", "context", "作用域"]),
    ("class", &["类", "class", "constructor", "构造函数", "实例", "instance"]),
    ("es6", &["ES6", "ES2015", "解构", "箭头函数", "模板字符串", "spread", "展开运算符"]),
    ("module", &["模块", "module", "import", "export", "模块化", "导入", "导出"]),
];

const PYTHON_TERMS: &[(&str, &[&str])] = &[
    ("variable", &["变量", "变量定义", "赋值", "变量名", "assignment"]),
    ("datatype", &["数据类型", "int", "float", "str", "bool", "tuple", "类型"]),
    ("conditional", &["条件", "if", "elif", "else", "条件语句", "判断", "分支"]),
    ("loop", &["循环", "for", "while", "range", "遍历", "迭代"]),
    ("function", &["函数", "def", "lambda", "参数", "返回值", "return"]),
    ("class", &["类", "class", "self", "__init__", "继承", "实例", "对象"]),
    ("module", &["模块", "import", "package", "包", "导入"]),
    ("exception", &["异常", "try", "except", "raise", "finally", "错误处理"]),
    ("file", &["文件", "open", "with", "读写", "文件操作"]),
    ("comprehension", &["推导式", "列表推导", "generator", "生成器"]),
    ("string", &["字符串", "str", "f-string", "格式化"]),
    ("list", &["列表", "list", "append", "切片", "slice"]),
    ("dict", &["字典", "dict", "键值对", "keys", "items"]),
];

static JAVASCRIPT: LazyLock<TermDictionary> =
    LazyLock::new(|| TermDictionary::from_static(JAVASCRIPT_TERMS));
static PYTHON: LazyLock<TermDictionary> =
    LazyLock::new(|| TermDictionary::from_static(PYTHON_TERMS));
static COMBINED: LazyLock<TermDictionary> = LazyLock::new(|| {
    let mut combined = JAVASCRIPT.clone();
    combined.concepts.extend(PYTHON.concepts.iter().cloned());
    combined
});

impl TermDictionary {
    /// Build a dictionary from `(key, surfaces)` pairs.
    pub fn new<K, S, I>(pairs: impl IntoIterator<Item = (K, I)>) -> Self
    where
        K: Into<String>,
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        Self {
            concepts: pairs
                .into_iter()
                .map(|(key, surfaces)| Concept {
                    key: key.into(),
                    surfaces: surfaces.into_iter().map(Into::into).collect(),
                })
                .collect(),
        }
    }

    fn from_static(pairs: &[(&str, &[&str])]) -> Self {
        Self::new(pairs.iter().map(|(key, surfaces)| (*key, surfaces.iter().copied())))
    }

    /// Built-in dictionary for a track.
    #[must_use]
    pub fn for_track(track: Track) -> &'static Self {
        match track {
            Track::JavaScript => &JAVASCRIPT,
            Track::Python => &PYTHON,
        }
    }

    /// Union of every built-in dictionary, JavaScript first.
    #[must_use]
    pub fn combined() -> &'static Self {
        &COMBINED
    }

    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Canonical keys whose key or any surface form appears in `text`
    /// (case-insensitive substring), in dictionary order.
    pub fn concepts_in(&self, text: &str) -> Vec<&str> {
        let lowered = text.to_lowercase();
        let mut keys: Vec<&str> = Vec::new();
        for concept in &self.concepts {
            let hit = lowered.contains(&concept.key.to_lowercase())
                || concept
                    .surfaces
                    .iter()
                    .any(|surface| lowered.contains(&surface.to_lowercase()));
            if hit && !keys.contains(&concept.key.as_str()) {
                keys.push(&concept.key);
            }
        }
        keys
    }

    /// `(key, surface)` pairs for every surface longer than `min_chars`
    /// characters found in `text`.
    pub fn surface_forms_in<'a>(&'a self, text: &str, min_chars: usize) -> Vec<(&'a str, &'a str)> {
        let lowered = text.to_lowercase();
        let mut found = Vec::new();
        for concept in &self.concepts {
            let candidates = std::iter::once(&concept.key).chain(concept.surfaces.iter());
            for surface in candidates {
                if surface.chars().count() > min_chars && lowered.contains(&surface.to_lowercase()) {
                    found.push((concept.key.as_str(), surface.as_str()));
                }
            }
        }
        found
    }

    /// Other names of the first concept named by `term`.
    pub fn aliases_for(&self, term: &str) -> Vec<&str> {
        let term = term.to_lowercase();
        self.concepts
            .iter()
            .find(|concept| concept.names(&term))
            .map(|concept| {
                std::iter::once(concept.key.as_str())
                    .chain(concept.surfaces.iter().map(String::as_str))
                    .filter(|name| name.to_lowercase() != term)
                    .collect()
            })
            .unwrap_or_default()
    }
}
