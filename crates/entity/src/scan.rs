//! Per-language entity scanners.
//!
//! These are deliberately line-regex based: they recognise declaration
//! shapes, not full grammars. Framework-aware extraction (route tables,
//! ORM models, richer call graphs) plugs in through the same
//! [`SourceScanner`] trait.

use regex::Regex;

use crate::types::{EntityKind, EntityRecord};

/// Extracts entity records from one source file.
pub trait SourceScanner: Send + Sync {
    /// File extensions (without the dot) this scanner handles.
    fn extensions(&self) -> &[&str];

    fn scan(&self, file_path: &str, module: &str, source: &str) -> Vec<EntityRecord>;
}

/// Marks `line_end` as the line before the next same-or-outer-level
/// declaration, or the end of the file.
fn close_open_spans(records: &mut [EntityRecord], decl_lines: &[u32], total_lines: u32) {
    for record in records.iter_mut() {
        let next = decl_lines
            .iter()
            .copied()
            .find(|&l| l > record.line_start)
            .unwrap_or(total_lines + 1);
        record.line_end = next.saturating_sub(1).max(record.line_start);
    }
}

pub struct PythonScanner {
    def_re: Regex,
    class_re: Regex,
    const_re: Regex,
    route_re: Regex,
    doc_re: Regex,
}

impl Default for PythonScanner {
    fn default() -> Self {
        Self {
            def_re: Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)\s*\(([^)]*)").expect("static pattern"),
            class_re: Regex::new(r"^\s*class\s+(\w+)").expect("static pattern"),
            const_re: Regex::new(r"^([A-Z][A-Z0-9_]{2,})\s*=").expect("static pattern"),
            route_re: Regex::new(r#"^\s*@\w+\.(?:route|get|post|put|delete|patch)\s*\("#).expect("static pattern"),
            doc_re: Regex::new(r#"^\s*(?:"{3}|'{3})(.*?)(?:"{3}|'{3})?\s*$"#).expect("static pattern"),
        }
    }
}

impl SourceScanner for PythonScanner {
    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn scan(&self, file_path: &str, module: &str, source: &str) -> Vec<EntityRecord> {
        let lines: Vec<&str> = source.lines().collect();
        let mut records = Vec::new();
        let mut decl_lines = Vec::new();
        let mut route_pending = false;

        for (i, line) in lines.iter().enumerate() {
            let line_no = (i + 1) as u32;
            if self.route_re.is_match(line) {
                route_pending = true;
                continue;
            }
            if let Some(caps) = self.def_re.captures(line) {
                decl_lines.push(line_no);
                let name = caps[1].to_string();
                let kind = if route_pending {
                    EntityKind::Endpoint
                } else {
                    EntityKind::Function
                };
                let docstring = lines
                    .get(i + 1)
                    .and_then(|next| self.doc_re.captures(next))
                    .map(|c| c[1].trim().to_string())
                    .filter(|d| !d.is_empty());
                records.push(EntityRecord {
                    name: name.clone(),
                    kind,
                    module: module.to_string(),
                    file_path: file_path.to_string(),
                    line_start: line_no,
                    line_end: line_no,
                    signature: Some(format!("def {name}({})", &caps[2])),
                    docstring,
                    calls: Vec::new(),
                });
            } else if let Some(caps) = self.class_re.captures(line) {
                decl_lines.push(line_no);
                records.push(EntityRecord {
                    name: caps[1].to_string(),
                    kind: EntityKind::Class,
                    module: module.to_string(),
                    file_path: file_path.to_string(),
                    line_start: line_no,
                    line_end: line_no,
                    signature: Some(format!("class {}", &caps[1])),
                    docstring: None,
                    calls: Vec::new(),
                });
            } else if let Some(caps) = self.const_re.captures(line) {
                records.push(EntityRecord {
                    name: caps[1].to_string(),
                    kind: EntityKind::Constant,
                    module: module.to_string(),
                    file_path: file_path.to_string(),
                    line_start: line_no,
                    line_end: line_no,
                    signature: None,
                    docstring: None,
                    calls: Vec::new(),
                });
            }
            route_pending = false;
        }

        close_open_spans(&mut records, &decl_lines, lines.len() as u32);
        records
    }
}

pub struct RustScanner {
    fn_re: Regex,
    type_re: Regex,
    const_re: Regex,
}

impl Default for RustScanner {
    fn default() -> Self {
        Self {
            fn_re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").expect("static pattern"),
            type_re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+(\w+)").expect("static pattern"),
            const_re: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+([A-Z][A-Z0-9_]*)\s*:").expect("static pattern"),
        }
    }
}

impl SourceScanner for RustScanner {
    fn extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn scan(&self, file_path: &str, module: &str, source: &str) -> Vec<EntityRecord> {
        let lines: Vec<&str> = source.lines().collect();
        let mut records = Vec::new();
        let mut decl_lines = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let line_no = (i + 1) as u32;
            let (kind, caps) = if let Some(caps) = self.fn_re.captures(line) {
                (EntityKind::Function, caps)
            } else if let Some(caps) = self.type_re.captures(line) {
                (EntityKind::Class, caps)
            } else if let Some(caps) = self.const_re.captures(line) {
                (EntityKind::Constant, caps)
            } else {
                continue;
            };
            if kind != EntityKind::Constant {
                decl_lines.push(line_no);
            }
            records.push(EntityRecord {
                name: caps[1].to_string(),
                kind,
                module: module.to_string(),
                file_path: file_path.to_string(),
                line_start: line_no,
                line_end: line_no,
                signature: Some(line.trim().trim_end_matches('{').trim().to_string()),
                docstring: None,
                calls: Vec::new(),
            });
        }

        close_open_spans(&mut records, &decl_lines, lines.len() as u32);
        records
    }
}

pub struct JsScanner {
    fn_re: Regex,
    arrow_re: Regex,
    class_re: Regex,
    route_re: Regex,
}

impl Default for JsScanner {
    fn default() -> Self {
        Self {
            fn_re: Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)").expect("static pattern"),
            arrow_re: Regex::new(r"^\s*(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s*)?\(").expect("static pattern"),
            class_re: Regex::new(r"^\s*(?:export\s+)?class\s+(\w+)").expect("static pattern"),
            route_re: Regex::new(r#"\b\w+\.(?:get|post|put|delete|patch)\s*\(\s*['"]([^'"]+)"#).expect("static pattern"),
        }
    }
}

impl SourceScanner for JsScanner {
    fn extensions(&self) -> &[&str] {
        &["js", "jsx", "ts", "tsx"]
    }

    fn scan(&self, file_path: &str, module: &str, source: &str) -> Vec<EntityRecord> {
        let lines: Vec<&str> = source.lines().collect();
        let mut records = Vec::new();
        let mut decl_lines = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let line_no = (i + 1) as u32;
            if let Some(caps) = self
                .fn_re
                .captures(line)
                .or_else(|| self.arrow_re.captures(line))
            {
                decl_lines.push(line_no);
                records.push(EntityRecord {
                    name: caps[1].to_string(),
                    kind: EntityKind::Function,
                    module: module.to_string(),
                    file_path: file_path.to_string(),
                    line_start: line_no,
                    line_end: line_no,
                    signature: Some(line.trim().trim_end_matches('{').trim().to_string()),
                    docstring: None,
                    calls: Vec::new(),
                });
            } else if let Some(caps) = self.class_re.captures(line) {
                decl_lines.push(line_no);
                records.push(EntityRecord {
                    name: caps[1].to_string(),
                    kind: EntityKind::Class,
                    module: module.to_string(),
                    file_path: file_path.to_string(),
                    line_start: line_no,
                    line_end: line_no,
                    signature: Some(line.trim().trim_end_matches('{').trim().to_string()),
                    docstring: None,
                    calls: Vec::new(),
                });
            } else if let Some(caps) = self.route_re.captures(line) {
                records.push(EntityRecord {
                    name: caps[1].to_string(),
                    kind: EntityKind::Endpoint,
                    module: module.to_string(),
                    file_path: file_path.to_string(),
                    line_start: line_no,
                    line_end: line_no,
                    signature: Some(line.trim().to_string()),
                    docstring: None,
                    calls: Vec::new(),
                });
            }
        }

        close_open_spans(&mut records, &decl_lines, lines.len() as u32);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_scanner_finds_defs_classes_and_routes() {
        let source = r#"
MAX_RETRIES = 3

@app.route("/login")
def login(user, password):
    """Authenticate a user."""
    return check(user, password)

class PaymentProcessor:
    def charge(self, amount):
        pass
"#;
        let records = PythonScanner::default().scan("app.py", "app", source);
        let login = records.iter().find(|r| r.name == "login").unwrap();
        assert_eq!(login.kind, EntityKind::Endpoint);
        assert_eq!(login.docstring.as_deref(), Some("Authenticate a user."));
        assert_eq!(login.signature.as_deref(), Some("def login(user, password"));

        let class = records.iter().find(|r| r.name == "PaymentProcessor").unwrap();
        assert_eq!(class.kind, EntityKind::Class);

        let charge = records.iter().find(|r| r.name == "charge").unwrap();
        assert_eq!(charge.kind, EntityKind::Function);

        let constant = records.iter().find(|r| r.name == "MAX_RETRIES").unwrap();
        assert_eq!(constant.kind, EntityKind::Constant);
    }

    #[test]
    fn python_line_spans_cover_bodies() {
        let source = "def first():\n    a = 1\n    return a\n\ndef second():\n    pass\n";
        let records = PythonScanner::default().scan("m.py", "m", source);
        let first = records.iter().find(|r| r.name == "first").unwrap();
        assert_eq!(first.line_start, 1);
        assert_eq!(first.line_end, 4);
        let second = records.iter().find(|r| r.name == "second").unwrap();
        assert_eq!(second.line_start, 5);
        assert_eq!(second.line_end, 6);
    }

    #[test]
    fn rust_scanner_finds_items() {
        let source = r#"
pub const MAX_DEPTH: usize = 8;

pub struct Session {
    id: String,
}

pub(crate) async fn handle_request(req: Request) -> Response {
    todo!()
}

trait Store {}
"#;
        let records = RustScanner::default().scan("lib.rs", "lib", source);
        assert!(records.iter().any(|r| r.name == "MAX_DEPTH" && r.kind == EntityKind::Constant));
        assert!(records.iter().any(|r| r.name == "Session" && r.kind == EntityKind::Class));
        assert!(records.iter().any(|r| r.name == "handle_request" && r.kind == EntityKind::Function));
        assert!(records.iter().any(|r| r.name == "Store" && r.kind == EntityKind::Class));
    }

    #[test]
    fn js_scanner_finds_functions_classes_and_endpoints() {
        let source = r#"
export function renderPage(props) {}
const fetchUser = async (id) => api.get(id);
export class CartStore {}
router.post('/checkout', handleCheckout);
"#;
        let records = JsScanner::default().scan("app.ts", "app", source);
        assert!(records.iter().any(|r| r.name == "renderPage" && r.kind == EntityKind::Function));
        assert!(records.iter().any(|r| r.name == "fetchUser" && r.kind == EntityKind::Function));
        assert!(records.iter().any(|r| r.name == "CartStore" && r.kind == EntityKind::Class));
        assert!(records.iter().any(|r| r.name == "/checkout" && r.kind == EntityKind::Endpoint));
    }
}
