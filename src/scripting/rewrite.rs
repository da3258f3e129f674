//! Fragment rewriting.
//!
//! Turns a captured fragment into something that can be evaluated over and
//! over against one long-lived scope:
//!
//! - `let`/`const`/`var` outside function bodies are stripped, so every
//!   declared name lands in the shared scope (the names are returned so the
//!   evaluator can pre-declare them);
//! - `let {a, b} = rhs` and `let [x, ...rest] = rhs` become one temporary per
//!   distinct `rhs` plus plain assignments out of it;
//! - top-level `await` statements are split out into suspend points.
//!
//! This is a token-level rewrite, not a parse. Patterns it does not recognise
//! (nested destructuring, defaults, computed keys) pass through untouched and
//! fail later in the real parser.

use std::collections::HashMap;

use super::lexer::{Token, TokenKind, is_identifier, tokenize};

/// Marks a statement that waits on a pending host operation
pub const SUSPEND_MARKER: &str = "await";

/// Calls that make an asynchronous fragment's result visible
const REPORT_CALLS: &[&str] = &["echo", "report", "print"];

const DECLARATIONS: &[&str] = &["let", "const", "var"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain script, run as-is
    Script(String),
    /// `target = await expr`
    Await { target: Option<String>, expr: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSignature {
    pub name: String,
    pub params: Vec<String>,
}

impl FnSignature {
    pub fn takes(&self, param: &str) -> bool {
        self.params.iter().any(|p| p == param)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    pub segments: Vec<Segment>,
    /// Names that must exist in the shared scope before running
    pub bindings: Vec<String>,
    /// Destructuring temporaries, reset after the run
    pub temporaries: Vec<String>,
    /// First line is `let name = ...`: echo `name` afterwards
    pub echo_name: Option<String>,
    /// First line declares this function
    pub leading_fn: Option<FnSignature>,
    pub suspends: bool,
    /// An explicit echo/report call is present
    pub reports: bool,
    /// `await` appeared somewhere other than a top-level statement
    pub nested_await: bool,
}

impl Rewrite {
    /// The rewritten fragment as a single string
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Script(script) => script.clone(),
                Segment::Await {
                    target: Some(target),
                    expr,
                } => format!("{target} = {SUSPEND_MARKER} {expr};"),
                Segment::Await { target: None, expr } => format!("{SUSPEND_MARKER} {expr};"),
            })
            .collect()
    }
}

pub fn rewrite(fragment: &str) -> Rewrite {
    let tokens: Vec<Token<'_>> = tokenize(fragment)
        .into_iter()
        .filter(|t| !t.is_trivia())
        .collect();

    let mut out = Rewrite {
        echo_name: leading_assignment(&tokens),
        leading_fn: leading_function(&tokens),
        suspends: tokens.iter().any(|t| t.is_ident(SUSPEND_MARKER)),
        reports: reports_result(&tokens),
        ..Rewrite::default()
    };

    let text = Declarations::new(fragment, tokens).rewrite(&mut out);

    if out.suspends {
        let (segments, nested) = split_suspend_points(&text);
        out.segments = segments;
        out.nested_await = nested;
    } else {
        out.segments = vec![Segment::Script(text)];
    }
    out
}

fn next_code(tokens: &[Token<'_>], mut i: usize) -> Option<usize> {
    while i < tokens.len() {
        if tokens[i].kind != TokenKind::Newline {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// `let|const|var name =` opening the first line
fn leading_assignment(tokens: &[Token<'_>]) -> Option<String> {
    let first = next_code(tokens, 0)?;
    let [kw, name, eq] = tokens.get(first..first + 3)? else {
        return None;
    };
    (DECLARATIONS.contains(&kw.text) && name.kind == TokenKind::Ident && eq.is_punct("="))
        .then(|| name.text.to_string())
}

/// `[private] fn name(params)` opening the first line
fn leading_function(tokens: &[Token<'_>]) -> Option<FnSignature> {
    let mut i = next_code(tokens, 0)?;
    if tokens[i].is_ident("private") {
        i += 1;
    }
    if !tokens.get(i)?.is_ident("fn") {
        return None;
    }
    let name = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Ident)?;
    if !tokens.get(i + 2)?.is_punct("(") {
        return None;
    }
    let mut params = Vec::new();
    for token in &tokens[i + 3..] {
        match token.kind {
            TokenKind::Ident => params.push(token.text.to_string()),
            TokenKind::Punct if token.text == ")" => {
                return Some(FnSignature {
                    name: name.text.to_string(),
                    params,
                });
            }
            TokenKind::Punct if token.text == "," => {}
            TokenKind::Newline => {}
            _ => return None,
        }
    }
    None
}

fn reports_result(tokens: &[Token<'_>]) -> bool {
    tokens.windows(2).any(|pair| {
        pair[0].kind == TokenKind::Ident
            && REPORT_CALLS.contains(&pair[0].text)
            && pair[1].is_punct("(")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Function,
    Closure,
    Block,
    Map,
    Group,
}

enum Target {
    /// `name = tmp.key`
    Key { key: String, name: String },
    /// `name = tmp[index]`
    Index { index: usize, name: String },
    /// `name = tmp.extract(index)`
    Rest { index: usize, name: String },
}

impl Target {
    fn name(&self) -> &str {
        match self {
            Target::Key { name, .. } | Target::Index { name, .. } | Target::Rest { name, .. } => {
                name
            }
        }
    }

    fn access(&self, temp: &str) -> String {
        match self {
            Target::Key { key, .. } => format!("{temp}.{key}"),
            Target::Index { index, .. } => format!("{temp}[{index}]"),
            Target::Rest { index, .. } => format!("{temp}.extract({index})"),
        }
    }
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Declaration pass: destructuring and block-scope elision
struct Declarations<'a> {
    src: &'a str,
    tokens: Vec<Token<'a>>,
    frames: Vec<Frame>,
    edits: Vec<Edit>,
    temps: HashMap<String, String>,
    temp_count: usize,
}

impl<'a> Declarations<'a> {
    fn new(src: &'a str, tokens: Vec<Token<'a>>) -> Self {
        Self {
            src,
            tokens,
            frames: Vec::new(),
            edits: Vec::new(),
            temps: HashMap::new(),
            temp_count: 0,
        }
    }

    fn in_function(&self) -> bool {
        self.frames
            .iter()
            .any(|f| matches!(f, Frame::Function | Frame::Closure))
    }

    fn rewrite(mut self, out: &mut Rewrite) -> String {
        let mut fn_header = false;
        let mut closure_header = false;
        let mut prev: Option<Token<'a>> = None;
        let mut i = 0;

        while i < self.tokens.len() {
            let tok = self.tokens[i];
            if tok.kind == TokenKind::Newline {
                i += 1;
                continue;
            }

            match (tok.kind, tok.text) {
                (TokenKind::Punct, "{") => {
                    let frame = if fn_header {
                        Frame::Function
                    } else if closure_header {
                        Frame::Closure
                    } else {
                        Frame::Block
                    };
                    self.frames.push(frame);
                    fn_header = false;
                }
                (TokenKind::Punct, "#{") => self.frames.push(Frame::Map),
                (TokenKind::Punct, "(" | "[") => self.frames.push(Frame::Group),
                (TokenKind::Punct, "}" | ")" | "]") => {
                    self.frames.pop();
                }
                (TokenKind::Punct, "|" | "||") if operand_expected(prev) => {
                    let close = if tok.text == "|" {
                        self.closing_bar(i)
                    } else {
                        i
                    };
                    let body = next_code(&self.tokens, close + 1);
                    closure_header = body.is_some_and(|b| self.tokens[b].is_punct("{"));
                    prev = Some(self.tokens[close]);
                    i = close + 1;
                    continue;
                }
                (TokenKind::Ident, "fn") => fn_header = true,
                (TokenKind::Ident, kw) if DECLARATIONS.contains(&kw) => {
                    if let Some(resume) = self.declaration(i, out) {
                        prev = self.tokens.get(resume.saturating_sub(1)).copied();
                        i = resume;
                        continue;
                    }
                }
                _ => {}
            }

            closure_header = false;
            prev = Some(tok);
            i += 1;
        }

        self.apply()
    }

    /// Index of the `|` closing a closure parameter list
    fn closing_bar(&self, open: usize) -> usize {
        (open + 1..self.tokens.len())
            .find(|&j| self.tokens[j].is_punct("|"))
            .unwrap_or(self.tokens.len() - 1)
    }

    /// Handle `let`/`const`/`var` at `i`. Returns where to resume when a
    /// destructuring consumed tokens.
    fn declaration(&mut self, i: usize, out: &mut Rewrite) -> Option<usize> {
        let kw = self.tokens[i];
        let next = next_code(&self.tokens, i + 1)?;
        let in_function = self.in_function();

        match (self.tokens[next].kind, self.tokens[next].text) {
            (TokenKind::Punct, "{") => self.destructure(i, next, "}", in_function, out),
            (TokenKind::Punct, "[") => self.destructure(i, next, "]", in_function, out),
            (TokenKind::Ident, name) => {
                if in_function {
                    // Function scopes cannot see the shared scope; keep locals local
                    if kw.text == "var" {
                        self.edit(kw.start, kw.end(), "let");
                    }
                } else {
                    self.edit(kw.start, self.tokens[next].start, "");
                    push_unique(&mut out.bindings, name);
                }
                None
            }
            _ => None,
        }
    }

    fn destructure(
        &mut self,
        kw: usize,
        open: usize,
        close: &str,
        in_function: bool,
        out: &mut Rewrite,
    ) -> Option<usize> {
        let (targets, end) = if close == "}" {
            self.object_targets(open)?
        } else {
            self.array_targets(open)?
        };
        let eq = next_code(&self.tokens, end + 1)?;
        if !self.tokens[eq].is_punct("=") {
            return None;
        }
        let (rhs_start, rhs_end, resume) = self.rhs(eq + 1)?;
        let rhs = self.src[rhs_start..rhs_end].trim().to_string();

        let (temp, fresh) = self.temporary(&rhs, in_function);
        let decl = if in_function { "let " } else { "" };
        let mut parts = Vec::new();
        if fresh {
            parts.push(format!("{decl}{temp} = {rhs}"));
        }
        for target in &targets {
            parts.push(format!("{decl}{} = {}", target.name(), target.access(&temp)));
        }

        if !in_function {
            if fresh {
                push_unique(&mut out.temporaries, &temp);
                push_unique(&mut out.bindings, &temp);
            }
            for target in &targets {
                push_unique(&mut out.bindings, target.name());
            }
        }

        let start = self.tokens[kw].start;
        self.edit(start, rhs_end, &parts.join("; "));
        Some(resume)
    }

    /// `{ a, b: alias }` starting at `open`
    fn object_targets(&self, open: usize) -> Option<(Vec<Target>, usize)> {
        let mut targets = Vec::new();
        let mut i = next_code(&self.tokens, open + 1)?;
        loop {
            let tok = self.tokens[i];
            if tok.is_punct("}") {
                return Some((targets, i));
            }
            if tok.kind != TokenKind::Ident {
                return None;
            }
            let key = tok.text.to_string();
            i = next_code(&self.tokens, i + 1)?;
            let name = if self.tokens[i].is_punct(":") {
                let alias = next_code(&self.tokens, i + 1)?;
                if self.tokens[alias].kind != TokenKind::Ident {
                    return None;
                }
                i = next_code(&self.tokens, alias + 1)?;
                self.tokens[alias].text.to_string()
            } else {
                key.clone()
            };
            targets.push(Target::Key { key, name });

            if self.tokens[i].is_punct(",") {
                i = next_code(&self.tokens, i + 1)?;
            } else if !self.tokens[i].is_punct("}") {
                return None;
            }
        }
    }

    /// `[a, , b, ...rest]` starting at `open`
    fn array_targets(&self, open: usize) -> Option<(Vec<Target>, usize)> {
        let mut targets = Vec::new();
        let mut index = 0;
        let mut i = next_code(&self.tokens, open + 1)?;
        loop {
            let tok = self.tokens[i];
            match (tok.kind, tok.text) {
                (TokenKind::Punct, "]") => return Some((targets, i)),
                (TokenKind::Punct, ",") => {
                    // hole
                    index += 1;
                    i = next_code(&self.tokens, i + 1)?;
                    continue;
                }
                (TokenKind::Punct, "...") => {
                    let name = next_code(&self.tokens, i + 1)?;
                    let close = next_code(&self.tokens, name + 1)?;
                    if self.tokens[name].kind != TokenKind::Ident
                        || !self.tokens[close].is_punct("]")
                    {
                        return None;
                    }
                    targets.push(Target::Rest {
                        index,
                        name: self.tokens[name].text.to_string(),
                    });
                    return Some((targets, close));
                }
                (TokenKind::Ident, name) => {
                    targets.push(Target::Index {
                        index,
                        name: name.to_string(),
                    });
                    index += 1;
                }
                _ => return None,
            }
            i = next_code(&self.tokens, i + 1)?;
            if self.tokens[i].is_punct(",") {
                i = next_code(&self.tokens, i + 1)?;
            } else if !self.tokens[i].is_punct("]") {
                return None;
            }
        }
    }

    /// Right-hand side from `from` to the end of the statement: a `;` or
    /// newline at its own depth, or an unmatched closer.
    /// Returns (byte start, byte end, index of the terminator).
    fn rhs(&self, from: usize) -> Option<(usize, usize, usize)> {
        let mut depth = 0usize;
        let mut last = None;
        let mut i = from;
        while i < self.tokens.len() {
            let tok = self.tokens[i];
            if depth == 0
                && (tok.is_punct(";") || tok.kind == TokenKind::Newline || tok.closes())
            {
                break;
            }
            if tok.opens() {
                depth += 1;
            } else if tok.closes() {
                depth -= 1;
            }
            if tok.kind != TokenKind::Newline {
                last = Some(tok);
            }
            i += 1;
        }
        let first = next_code(&self.tokens, from).filter(|&f| f < i)?;
        Some((self.tokens[first].start, last?.end(), i))
    }

    fn temporary(&mut self, rhs: &str, in_function: bool) -> (String, bool) {
        if !in_function {
            if let Some(temp) = self.temps.get(rhs) {
                return (temp.clone(), false);
            }
        }
        let temp = format!("destructured_{}", self.temp_count);
        self.temp_count += 1;
        if !in_function {
            self.temps.insert(rhs.to_string(), temp.clone());
        }
        (temp, true)
    }

    fn edit(&mut self, start: usize, end: usize, text: &str) {
        self.edits.push(Edit {
            start,
            end,
            text: text.to_string(),
        });
    }

    fn apply(mut self) -> String {
        self.edits.sort_by_key(|e| e.start);
        let mut text = String::with_capacity(self.src.len());
        let mut pos = 0;
        for edit in &self.edits {
            if edit.start < pos {
                continue;
            }
            text.push_str(&self.src[pos..edit.start]);
            text.push_str(&edit.text);
            pos = edit.end;
        }
        text.push_str(&self.src[pos..]);
        text
    }
}

/// After `prev`, would a `|` start a closure rather than be an operator?
fn operand_expected(prev: Option<Token<'_>>) -> bool {
    match prev {
        None => true,
        Some(tok) => match tok.kind {
            TokenKind::Punct => !matches!(tok.text, ")" | "]" | "}"),
            TokenKind::Ident => matches!(tok.text, "return" | "in" | "throw"),
            _ => false,
        },
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// Split rewritten text into script runs and top-level await statements.
/// Returns the segments and whether some `await` could not be split out.
fn split_suspend_points(text: &str) -> (Vec<Segment>, bool) {
    let tokens = tokenize(text);
    let mut segments = Vec::new();
    let mut nested = false;
    let mut depth = 0usize;
    let mut cursor = 0;
    let mut stmt_start = 0;
    let mut i = 0;

    while i < tokens.len() {
        let tok = tokens[i];
        match tok.kind {
            TokenKind::Newline if depth == 0 => stmt_start = tok.end(),
            TokenKind::Punct if depth == 0 && tok.text == ";" => stmt_start = tok.end(),
            TokenKind::Punct if tok.opens() => depth += 1,
            TokenKind::Punct if tok.closes() => depth = depth.saturating_sub(1),
            TokenKind::Ident if tok.text == SUSPEND_MARKER => {
                if depth > 0 {
                    nested = true;
                } else if let Some(target) = await_target(&text[stmt_start..tok.start]) {
                    let (end, resume) = statement_end(&tokens, i + 1, text.len());
                    push_script(&mut segments, &text[cursor..stmt_start]);
                    segments.push(Segment::Await {
                        target,
                        expr: text[tok.end()..end].trim().to_string(),
                    });
                    cursor = resume;
                    stmt_start = resume;
                    i = tokens
                        .iter()
                        .position(|t| t.start >= resume)
                        .unwrap_or(tokens.len());
                    continue;
                } else {
                    nested = true;
                }
            }
            _ => {}
        }
        i += 1;
    }

    push_script(&mut segments, &text[cursor..]);
    (segments, nested)
}

/// What precedes `await` in its statement: nothing, or `name =`.
/// `None` when the await sits inside a larger expression.
fn await_target(head: &str) -> Option<Option<String>> {
    let head = head.trim();
    if head.is_empty() {
        return Some(None);
    }
    let name = head.strip_suffix('=')?.trim_end();
    (is_identifier(name) && !head.ends_with("==")).then(|| Some(name.to_string()))
}

/// End of the statement starting at token `from`: byte offset of the end and
/// offset to resume scanning after its terminator.
fn statement_end(tokens: &[Token<'_>], from: usize, len: usize) -> (usize, usize) {
    let mut depth = 0usize;
    for tok in &tokens[from..] {
        if depth == 0 {
            if tok.is_punct(";") {
                return (tok.start, tok.end());
            }
            if tok.kind == TokenKind::Newline {
                return (tok.start, tok.start);
            }
        }
        if tok.opens() {
            depth += 1;
        } else if tok.closes() {
            depth = depth.saturating_sub(1);
        }
    }
    (len, len)
}

fn push_script(segments: &mut Vec<Segment>, text: &str) {
    let meaningful = tokenize(text)
        .iter()
        .any(|t| !t.is_trivia() && t.kind != TokenKind::Newline && !t.is_punct(";"));
    if meaningful {
        segments.push(Segment::Script(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(fragment: &str) -> String {
        let rewrite = rewrite(fragment);
        assert!(!rewrite.suspends);
        rewrite.text()
    }

    #[test]
    fn let_becomes_plain_assignment() {
        let rewrite = rewrite("let x = 1 + 2");
        assert_eq!(rewrite.text(), "x = 1 + 2");
        assert_eq!(rewrite.bindings, vec!["x"]);
        assert_eq!(rewrite.echo_name.as_deref(), Some("x"));
    }

    #[test]
    fn const_and_var_are_elided_too() {
        assert_eq!(script("const a = 1; var b = 2;"), "a = 1; b = 2;");
    }

    #[test]
    fn block_scoped_declarations_still_escape() {
        let rewrite = rewrite("if true { let y = 2; }");
        assert_eq!(rewrite.text(), "if true { y = 2; }");
        assert_eq!(rewrite.bindings, vec!["y"]);
        assert_eq!(rewrite.echo_name, None);
    }

    #[test]
    fn function_locals_stay_local() {
        let src = "fn f(x) { let y = x; var z = y; z }";
        let rewrite = rewrite(src);
        assert_eq!(rewrite.text(), "fn f(x) { let y = x; let z = y; z }");
        assert!(rewrite.bindings.is_empty());
    }

    #[test]
    fn closure_bodies_stay_local() {
        let rewrite = rewrite("let f = |x| { let y = x * 2; y };");
        assert_eq!(rewrite.text(), "f = |x| { let y = x * 2; y };");
        assert_eq!(rewrite.bindings, vec!["f"]);
    }

    #[test]
    fn logical_or_is_not_a_closure() {
        let rewrite = rewrite("if a || b { let c = 1; }");
        assert_eq!(rewrite.text(), "if a || b { c = 1; }");
    }

    #[test]
    fn object_destructuring() {
        let rewrite = rewrite("let {p, q} = #{p: 5, q: 6}");
        assert_eq!(
            rewrite.text(),
            "destructured_0 = #{p: 5, q: 6}; p = destructured_0.p; q = destructured_0.q"
        );
        assert_eq!(rewrite.bindings, vec!["destructured_0", "p", "q"]);
        assert_eq!(rewrite.temporaries, vec!["destructured_0"]);
        assert_eq!(rewrite.echo_name, None);
    }

    #[test]
    fn object_destructuring_with_alias() {
        assert_eq!(
            script("var { stdout: out } = result;"),
            "destructured_0 = result; out = destructured_0.stdout;"
        );
    }

    #[test]
    fn array_destructuring_with_hole_and_rest() {
        assert_eq!(
            script("let [a, , b, ...rest] = list"),
            "destructured_0 = list; a = destructured_0[0]; b = destructured_0[2]; rest = destructured_0.extract(3)"
        );
    }

    #[test]
    fn shared_rhs_is_evaluated_once() {
        let text = script("let {a} = make();\nlet [b] = make();\nlet {c} = other();");
        assert_eq!(
            text,
            "destructured_0 = make(); a = destructured_0.a;\n\
             b = destructured_0[0];\n\
             destructured_1 = other(); c = destructured_1.c;"
        );
    }

    #[test]
    fn destructuring_inside_functions_uses_locals() {
        assert_eq!(
            script("fn f(m) { let {a} = m; a }"),
            "fn f(m) { let destructured_0 = m; let a = destructured_0.a; a }"
        );
    }

    #[test]
    fn rhs_stops_at_newline() {
        let rewrite = rewrite("let {a} = #{\n a: 1\n}\na");
        assert_eq!(
            rewrite.text(),
            "destructured_0 = #{\n a: 1\n}; a = destructured_0.a\na"
        );
    }

    #[test]
    fn nested_patterns_pass_through() {
        let src = "let {a: {b}} = m";
        assert_eq!(script(src), src);
    }

    #[test]
    fn keywords_in_strings_are_ignored() {
        let src = r#"E.echo("let x = 1")"#;
        assert_eq!(script(src), src);
    }

    #[test]
    fn leading_function_signature() {
        let rewrite = rewrite("fn greet(E, prefix) {\n E.echo(\"hi\")\n}");
        assert_eq!(
            rewrite.leading_fn,
            Some(FnSignature {
                name: "greet".to_string(),
                params: vec!["E".to_string(), "prefix".to_string()],
            })
        );
        assert!(rewrite.leading_fn.unwrap().takes("E"));
    }

    #[test]
    fn private_function_and_later_functions() {
        assert_eq!(
            rewrite("private fn helper() { 1 }").leading_fn.map(|f| f.name),
            Some("helper".to_string())
        );
        assert_eq!(rewrite("1;\nfn late(E) {}").leading_fn, None);
    }

    #[test]
    fn echo_name_requires_first_line() {
        assert_eq!(rewrite("x + 1;\nlet y = 2").echo_name, None);
        assert_eq!(rewrite("\n  let y = 2").echo_name.as_deref(), Some("y"));
        assert_eq!(rewrite("let y == 2").echo_name, None);
    }

    #[test]
    fn await_statements_become_segments() {
        let rewrite = rewrite("let out = await E.run(\"ls\");\nE.echo(out.stdout)");
        assert!(rewrite.suspends);
        assert!(rewrite.reports);
        assert!(!rewrite.nested_await);
        assert_eq!(
            rewrite.segments,
            vec![
                Segment::Await {
                    target: Some("out".to_string()),
                    expr: "E.run(\"ls\")".to_string(),
                },
                Segment::Script("\nE.echo(out.stdout)".to_string()),
            ]
        );
        assert_eq!(rewrite.bindings, vec!["out"]);
    }

    #[test]
    fn bare_await_without_terminator() {
        let rewrite = rewrite("E.report(1)\nawait E.sleep(10)\nE.report(2)");
        assert_eq!(
            rewrite.segments,
            vec![
                Segment::Script("E.report(1)\n".to_string()),
                Segment::Await {
                    target: None,
                    expr: "E.sleep(10)".to_string(),
                },
                Segment::Script("\nE.report(2)".to_string()),
            ]
        );
    }

    #[test]
    fn await_on_one_line_with_semicolons() {
        let rewrite = rewrite("let a = 1; let b = await E.sleep(1); a + b");
        assert_eq!(
            rewrite.segments,
            vec![
                Segment::Script("a = 1;".to_string()),
                Segment::Await {
                    target: Some("b".to_string()),
                    expr: "E.sleep(1)".to_string(),
                },
                Segment::Script(" a + b".to_string()),
            ]
        );
    }

    #[test]
    fn nested_await_is_flagged() {
        assert!(rewrite("if x { await E.sleep(1) }").nested_await);
        assert!(rewrite("let y = 1 + await E.sleep(1)").nested_await);
    }

    #[test]
    fn await_in_a_string_does_not_suspend() {
        let rewrite = rewrite(r#"E.echo("await")"#);
        assert!(!rewrite.suspends);
    }

    #[test]
    fn missing_report_call_is_noticed() {
        assert!(!rewrite("let x = await E.run(\"ls\")").reports);
        assert!(rewrite("await E.run(\"ls\"); print(1)").reports);
    }
}
