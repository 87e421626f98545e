mod simplify;

use std::collections::{HashMap, HashSet};

use crate::config::Settings;

pub type TokenId = usize;

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("unterminated string literal at line {0}")]
    UnterminatedString(u32),
    #[error("unterminated character literal at line {0}")]
    UnterminatedChar(u32),
    #[error("unmatched '{text}' at line {line}")]
    UnmatchedBracket { text: String, line: u32 },
}

impl TokenizeError {
    pub fn line(&self) -> u32 {
        match self {
            TokenizeError::UnterminatedString(line)
            | TokenizeError::UnterminatedChar(line)
            | TokenizeError::UnmatchedBracket { line, .. } => *line,
        }
    }
}

/// One node of the token stream. Lives in the arena of its [`TokenList`];
/// `prev`/`next`/`link` are arena indices, so deleting a token can never
/// leave a dangling pointer, only a broken link that validation catches.
#[derive(Debug, Clone)]
pub struct Token {
    text: String,
    file_index: usize,
    line: u32,
    var_id: u32,
    is_name: bool,
    is_number: bool,
    is_op: bool,
    link: Option<TokenId>,
    prev: Option<TokenId>,
    next: Option<TokenId>,
}

impl Token {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn file_index(&self) -> usize {
        self.file_index
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// 0 means "not a variable".
    pub fn var_id(&self) -> u32 {
        self.var_id
    }

    pub fn is_name(&self) -> bool {
        self.is_name
    }

    pub fn is_number(&self) -> bool {
        self.is_number
    }

    pub fn is_op(&self) -> bool {
        self.is_op
    }

    /// Matching bracket for `(`/`)`/`[`/`]`/`{`/`}` tokens.
    pub fn link(&self) -> Option<TokenId> {
        self.link
    }
}

/// Owns every token of one translation-unit-configuration, plus the table
/// mapping compact file indices to file path strings.
#[derive(Debug, Default)]
pub struct TokenList {
    arena: Vec<Token>,
    head: Option<TokenId>,
    tail: Option<TokenId>,
    files: Vec<String>,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_index(&mut self, name: &str) -> usize {
        if let Some(pos) = self.files.iter().position(|f| f == name) {
            return pos;
        }
        self.files.push(name.to_string());
        self.files.len() - 1
    }

    pub fn file_name(&self, index: usize) -> &str {
        self.files.get(index).map_or("", String::as_str)
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn front(&self) -> Option<TokenId> {
        self.head
    }

    pub fn back(&self) -> Option<TokenId> {
        self.tail
    }

    pub fn at(&self, id: TokenId) -> &Token {
        &self.arena[id]
    }

    pub fn text(&self, id: TokenId) -> &str {
        &self.arena[id].text
    }

    pub fn next(&self, id: TokenId) -> Option<TokenId> {
        self.arena[id].next
    }

    pub fn prev(&self, id: TokenId) -> Option<TokenId> {
        self.arena[id].prev
    }

    /// `n` tokens forward from `id`.
    pub fn nth_next(&self, id: TokenId, n: usize) -> Option<TokenId> {
        let mut current = Some(id);
        for _ in 0..n {
            current = current.and_then(|t| self.arena[t].next);
        }
        current
    }

    pub fn set_var_id(&mut self, id: TokenId, var_id: u32) {
        self.arena[id].var_id = var_id;
    }

    pub fn set_link(&mut self, id: TokenId, link: Option<TokenId>) {
        self.arena[id].link = link;
    }

    /// Replace a token's text, refreshing the derived flags.
    pub fn set_text(&mut self, id: TokenId, text: &str) {
        let tok = &mut self.arena[id];
        tok.text = text.to_string();
        tok.is_name = text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        tok.is_number = text.chars().next().is_some_and(|c| c.is_ascii_digit());
        tok.is_op = !tok.is_name && !tok.is_number && is_operator_text(text);
    }

    pub fn push_back(&mut self, text: &str, file_index: usize, line: u32) -> TokenId {
        let id = self.arena.len();
        self.arena.push(Token {
            text: String::new(),
            file_index,
            line,
            var_id: 0,
            is_name: false,
            is_number: false,
            is_op: false,
            link: None,
            prev: self.tail,
            next: None,
        });
        self.set_text(id, text);
        match self.tail {
            Some(tail) => self.arena[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Insert a new token after `id`, inheriting its file and line.
    pub fn insert_after(&mut self, id: TokenId, text: &str) -> TokenId {
        let new_id = self.arena.len();
        let (file_index, line, old_next) = {
            let tok = &self.arena[id];
            (tok.file_index, tok.line, tok.next)
        };
        self.arena.push(Token {
            text: String::new(),
            file_index,
            line,
            var_id: 0,
            is_name: false,
            is_number: false,
            is_op: false,
            link: None,
            prev: Some(id),
            next: old_next,
        });
        self.set_text(new_id, text);
        self.arena[id].next = Some(new_id);
        match old_next {
            Some(next) => self.arena[next].prev = Some(new_id),
            None => self.tail = Some(new_id),
        }
        new_id
    }

    /// Unlink a token from the stream. The caller is responsible for the
    /// bracket links of any surviving partner; a stale link is caught by
    /// [`TokenList::validate_links`].
    pub fn delete(&mut self, id: TokenId) {
        let (prev, next) = (self.arena[id].prev, self.arena[id].next);
        match prev {
            Some(p) => self.arena[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena[n].prev = prev,
            None => self.tail = prev,
        }
        let tok = &mut self.arena[id];
        tok.prev = None;
        tok.next = None;
        tok.link = None;
    }

    /// Walk the stream and re-check the bracket invariant: every opening
    /// bracket links to its matching close at the same depth and the links
    /// are symmetric. Returns false when a rewrite broke the invariant.
    pub fn validate_links(&self) -> bool {
        let mut stack: Vec<(TokenId, char)> = Vec::new();
        let mut id = self.head;
        while let Some(current) = id {
            let tok = &self.arena[current];
            match tok.text.as_str() {
                "(" | "[" | "{" => {
                    stack.push((current, tok.text.chars().next().unwrap()));
                }
                ")" | "]" | "}" => {
                    let close = tok.text.chars().next().unwrap();
                    let Some((open_id, open)) = stack.pop() else {
                        return false;
                    };
                    if matching_close(open) != close {
                        return false;
                    }
                    if self.arena[open_id].link != Some(current)
                        || self.arena[current].link != Some(open_id)
                    {
                        return false;
                    }
                }
                _ => {}
            }
            id = tok.next;
        }
        stack.is_empty()
    }

    /// Match a token sequence against a pattern. Pattern elements are
    /// literal texts or one of `%name%`, `%num%`, `%var%`, `%op%`,
    /// `%str%`, `%any%`. An element may list alternatives separated by
    /// `|`, e.g. `"if|while"`.
    pub fn matches(&self, start: TokenId, pattern: &[&str]) -> bool {
        let mut id = Some(start);
        for element in pattern {
            let Some(current) = id else {
                return false;
            };
            let tok = &self.arena[current];
            let ok = element.split('|').any(|alt| match alt {
                "%name%" => tok.is_name,
                "%num%" => tok.is_number,
                "%var%" => tok.var_id != 0,
                "%op%" => tok.is_op,
                "%str%" => tok.text.starts_with('"'),
                "%any%" => true,
                literal => tok.text == literal,
            });
            if !ok {
                return false;
            }
            id = tok.next;
        }
        true
    }

    fn create_links(&mut self) -> Result<(), TokenizeError> {
        let mut stack: Vec<(TokenId, char)> = Vec::new();
        let mut id = self.head;
        while let Some(current) = id {
            let (text, line) = {
                let tok = &self.arena[current];
                (tok.text.clone(), tok.line)
            };
            match text.as_str() {
                "(" | "[" | "{" => stack.push((current, text.chars().next().unwrap())),
                ")" | "]" | "}" => {
                    let close = text.chars().next().unwrap();
                    match stack.pop() {
                        Some((open_id, open)) if matching_close(open) == close => {
                            self.arena[open_id].link = Some(current);
                            self.arena[current].link = Some(open_id);
                        }
                        _ => {
                            return Err(TokenizeError::UnmatchedBracket { text, line });
                        }
                    }
                }
                _ => {}
            }
            id = self.arena[current].next;
        }
        if let Some((open_id, _)) = stack.pop() {
            let tok = &self.arena[open_id];
            return Err(TokenizeError::UnmatchedBracket {
                text: tok.text.clone(),
                line: tok.line,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn to_text(&self) -> String {
        let mut parts = Vec::new();
        let mut id = self.head;
        while let Some(current) = id {
            parts.push(self.arena[current].text.clone());
            id = self.arena[current].next;
        }
        parts.join(" ")
    }
}

fn matching_close(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn is_operator_text(text: &str) -> bool {
    !matches!(text, "(" | ")" | "[" | "]" | "{" | "}" | ";" | "," | "#")
        && !text.starts_with('"')
        && !text.starts_with('\'')
}

const TYPE_KEYWORDS: &[&str] = &[
    "bool", "char", "double", "float", "int", "long", "short", "signed", "size_t", "unsigned",
    "wchar_t",
];

const CONTROL_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "const", "continue", "default", "delete", "do", "else", "enum",
    "for", "goto", "if", "new", "return", "sizeof", "static", "struct", "switch", "typedef",
    "union", "while",
];

/// A function definition or declaration found by `fill_function_list`.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub token: TokenId,
    pub line: u32,
    pub file_index: usize,
    pub has_body: bool,
}

/// Turns preprocessed source text into a linked token stream and keeps it
/// canonical. One instance per translation-unit-configuration; never
/// shared between workers.
pub struct Tokenizer<'s> {
    #[allow(dead_code)]
    settings: &'s Settings,
    list: TokenList,
    configuration: String,
    functions: Vec<Function>,
    function_calls: HashSet<String>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(settings: &'s Settings) -> Self {
        Self {
            settings,
            list: TokenList::new(),
            configuration: String::new(),
            functions: Vec::new(),
            function_calls: HashSet::new(),
        }
    }

    pub fn tokens(&self) -> &TokenList {
        &self.list
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function_calls(&self) -> &HashSet<String> {
        &self.function_calls
    }

    /// Split source text into tokens, link brackets and assign variable
    /// ids. On error the stream must not be used; the caller skips this
    /// configuration and moves on.
    pub fn tokenize(
        &mut self,
        code: &str,
        filename: &str,
        configuration: &str,
    ) -> Result<(), TokenizeError> {
        self.configuration = configuration.to_string();
        self.list = TokenList::new();
        let file_index = self.list.file_index(filename);

        let chars: Vec<char> = code.chars().collect();
        let mut i = 0;
        let mut line: u32 = 1;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\n' => {
                    line += 1;
                    i += 1;
                }
                c if c.is_whitespace() => i += 1,
                '#' => {
                    // Remaining preprocessor lines (e.g. #include) carry no
                    // tokens for the checks.
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let start = i;
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    let text: String = chars[start..i].iter().collect();
                    self.list.push_back(&text, file_index, line);
                }
                c if c.is_ascii_digit() => {
                    let start = i;
                    while i < chars.len() {
                        let c = chars[i];
                        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                            i += 1;
                        } else if (c == '+' || c == '-')
                            && matches!(chars[i - 1], 'e' | 'E')
                            && chars[start..i].iter().all(|&c| c != 'x' && c != 'X')
                        {
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    let text: String = chars[start..i].iter().collect();
                    self.list.push_back(&text, file_index, line);
                }
                '"' | '\'' => {
                    let quote = c;
                    let start_line = line;
                    let start = i;
                    i += 1;
                    let mut closed = false;
                    while i < chars.len() {
                        let c = chars[i];
                        if c == '\n' {
                            break;
                        }
                        i += 1;
                        if c == '\\' {
                            if i < chars.len() {
                                i += 1;
                            }
                        } else if c == quote {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(if quote == '"' {
                            TokenizeError::UnterminatedString(start_line)
                        } else {
                            TokenizeError::UnterminatedChar(start_line)
                        });
                    }
                    let text: String = chars[start..i].iter().collect();
                    self.list.push_back(&text, file_index, line);
                }
                _ => {
                    let text = longest_operator(&chars[i..]);
                    i += text.chars().count();
                    self.list.push_back(&text, file_index, line);
                }
            }
        }

        self.list.create_links()?;
        self.set_var_ids();
        Ok(())
    }

    /// Assign variable ids from declarations visible in the stream.
    /// Heuristic scope tracking: one map per `{}` depth, innermost wins.
    fn set_var_ids(&mut self) {
        let mut scopes: Vec<HashMap<String, u32>> = vec![HashMap::new()];
        let mut next_id: u32 = 1;

        let mut id = self.list.front();
        while let Some(current) = id {
            let text = self.list.text(current).to_string();
            match text.as_str() {
                "{" => scopes.push(HashMap::new()),
                "}" => {
                    if scopes.len() > 1 {
                        scopes.pop();
                    }
                }
                _ if TYPE_KEYWORDS.contains(&text.as_str()) => {
                    // Skip over the rest of the type: more keywords and '*'.
                    let mut cursor = self.list.next(current);
                    while let Some(t) = cursor {
                        let s = self.list.text(t);
                        if TYPE_KEYWORDS.contains(&s) || s == "*" {
                            cursor = self.list.next(t);
                        } else {
                            break;
                        }
                    }
                    // Declarator list: name [;,=[)] then `, '*'* name` ...
                    while let Some(name_id) = cursor {
                        if !self.list.at(name_id).is_name
                            || CONTROL_KEYWORDS.contains(&self.list.text(name_id))
                        {
                            break;
                        }
                        let after = self.list.next(name_id);
                        let after_text: String =
                            after.map(|t| self.list.text(t).to_string()).unwrap_or_default();
                        if !matches!(after_text.as_str(), ";" | "," | "=" | "[" | ")") {
                            break;
                        }
                        let var_id = next_id;
                        next_id += 1;
                        self.list.set_var_id(name_id, var_id);
                        let name = self.list.text(name_id).to_string();
                        scopes.last_mut().unwrap().insert(name, var_id);
                        if after_text != "," {
                            break;
                        }
                        // Next declarator after the comma.
                        cursor = self.list.next(after.unwrap());
                        while let Some(t) = cursor {
                            if self.list.text(t) == "*" {
                                cursor = self.list.next(t);
                            } else {
                                break;
                            }
                        }
                        // `int a, f();` stops the declarator list here.
                        if cursor.is_some_and(|t| !self.list.at(t).is_name) {
                            break;
                        }
                    }
                }
                _ if self.list.at(current).is_name && self.list.at(current).var_id == 0 => {
                    if let Some(&var_id) = scopes.iter().rev().find_map(|s| s.get(&text)) {
                        // A name followed by '(' is a call, not a variable.
                        let is_call = self
                            .list
                            .next(current)
                            .is_some_and(|t| self.list.text(t) == "(");
                        if !is_call {
                            self.list.set_var_id(current, var_id);
                        }
                    }
                }
                _ => {}
            }
            id = self.list.next(current);
        }
    }

    /// Record function definitions and call sites. Must run before
    /// simplification (raw checks may need it) and again after (lines and
    /// body shapes change); calling it twice from the same stream state
    /// yields the same result.
    pub fn fill_function_list(&mut self) {
        self.functions.clear();
        self.function_calls.clear();

        let mut depth: usize = 0;
        let mut id = self.list.front();
        while let Some(current) = id {
            let tok = self.list.at(current);
            match tok.text() {
                "{" => depth += 1,
                "}" => depth = depth.saturating_sub(1),
                _ => {
                    if tok.is_name()
                        && tok.var_id() == 0
                        && !CONTROL_KEYWORDS.contains(&tok.text())
                        && !TYPE_KEYWORDS.contains(&tok.text())
                    {
                        let next = self.list.next(current);
                        if next.is_some_and(|n| self.list.text(n) == "(") {
                            let open = next.unwrap();
                            let after_close = self
                                .list
                                .at(open)
                                .link()
                                .and_then(|close| self.list.next(close));
                            let after_text =
                                after_close.map(|t| self.list.text(t)).unwrap_or("");
                            let prev_text = self
                                .list
                                .prev(current)
                                .map(|t| self.list.text(t))
                                .unwrap_or("");
                            let prev_is_type = TYPE_KEYWORDS.contains(&prev_text)
                                || prev_text == "*"
                                || prev_text == "void";

                            if after_text == "{" && depth == 0 {
                                let name = tok.text().to_string();
                                self.functions.push(Function {
                                    name,
                                    token: current,
                                    line: tok.line(),
                                    file_index: tok.file_index(),
                                    has_body: true,
                                });
                            } else if after_text != "{" && !prev_is_type {
                                self.function_calls.insert(tok.text().to_string());
                            }
                        }
                    }
                }
            }
            id = self.list.next(current);
        }
    }

    /// Rewrite the stream into its canonical form: a bounded fixed-point
    /// loop over independent rules. Returns false when a rewrite breaks
    /// the bracket invariant, which indicates a rule bug and must be
    /// surfaced by the caller, not ignored.
    pub fn simplify_token_list(&mut self) -> bool {
        const MAX_PASSES: usize = 100;

        simplify::simplify_null_constants(&mut self.list);

        for _ in 0..MAX_PASSES {
            let mut changed = false;
            changed |= simplify::remove_redundant_parentheses(&mut self.list);
            changed |= simplify::remove_redundant_casts(&mut self.list);
            changed |= simplify::fold_constants(&mut self.list);
            changed |= simplify::remove_empty_statements(&mut self.list);
            if !self.list.validate_links() {
                return false;
            }
            if !changed {
                break;
            }
        }
        self.list.validate_links()
    }
}

/// Longest-match operator scan; unknown characters become one-char tokens.
fn longest_operator(chars: &[char]) -> String {
    const THREE: &[&str] = &["<<=", ">>=", "...", "->*"];
    const TWO: &[&str] = &[
        "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=", "%=",
        "&=", "|=", "^=", "->", "::",
    ];

    if chars.len() >= 3 {
        let s: String = chars[..3].iter().collect();
        if THREE.contains(&s.as_str()) {
            return s;
        }
    }
    if chars.len() >= 2 {
        let s: String = chars[..2].iter().collect();
        if TWO.contains(&s.as_str()) {
            return s;
        }
    }
    chars[0].to_string()
}
