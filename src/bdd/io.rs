//! The BDD text file format (spec §6.2): a hand-rolled recursive-descent
//! reader/writer, grounded on the original toolchain's `bdd-io.cpp` line
//! sections. No parser-generator crate is pulled in for this — the grammar
//! is small and fully under our control, unlike the conditional-language
//! front end `lalrpop` served in the teacher.

use super::call::{ArgSlot, CallRecord};
use super::node::{Node, NodeId, RouteOp};
use super::{Bdd, DistinguishedSymbols};
use crate::expr::{ConstraintSet, Expr, SymbolicArray};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    MissingSection(&'static str),
    MalformedLine { section: &'static str, line: String },
    UnknownArray(String),
    UnknownNode(NodeId),
    Expr(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::MissingSection(s) => write!(f, "BDD file missing `{s}` section"),
            IoError::MalformedLine { section, line } => {
                write!(f, "malformed line in `{section}`: {line:?}")
            }
            IoError::UnknownArray(name) => write!(f, "reference to undeclared array `{name}`"),
            IoError::UnknownNode(id) => write!(f, "edge references unknown node id {id}"),
            IoError::Expr(msg) => write!(f, "expression parse error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

/// Writes `bdd` in the spec §6.2 text format.
pub fn write_bdd(bdd: &Bdd) -> String {
    let mut arrays = BTreeMap::new();
    for id in bdd.node_ids() {
        collect_node_arrays(bdd.get_node_by_id(id).unwrap(), &mut arrays);
    }
    for call in &bdd.init_prelude {
        collect_call_arrays(call, &mut arrays);
    }
    bdd.symbols.device.arrays(&mut arrays);
    bdd.symbols.packet_len.arrays(&mut arrays);
    bdd.symbols.time.arrays(&mut arrays);

    let mut out = String::new();
    out.push_str("===== BDD =====\n");

    out.push_str("kQuery\n");
    for (name, array) in &arrays {
        out.push_str(&format!("array {name} {} {} {}\n", array.size, array.index_width, array.value_width));
    }
    out.push_str("end\n");

    out.push_str("symbols\n");
    out.push_str(&format!("{}\n", bdd.symbols.device));
    out.push_str(&format!("{}\n", bdd.symbols.packet_len));
    out.push_str(&format!("{}\n", bdd.symbols.time));
    out.push_str("end\n");

    out.push_str("init\n");
    for call in &bdd.init_prelude {
        out.push_str(&serialize_call(call));
        out.push('\n');
    }
    out.push_str("end\n");

    out.push_str("nodes\n");
    for id in bdd.node_ids() {
        let node = bdd.get_node_by_id(id).unwrap();
        out.push_str(&format!("{id}:({} {})\n", node.constraints().len(), serialize_node_payload(node)));
    }
    out.push_str("end\n");

    out.push_str("edges\n");
    for id in bdd.node_ids() {
        match bdd.get_node_by_id(id).unwrap() {
            Node::Branch { on_true, on_false, .. } => out.push_str(&format!("({id}->{on_true}->{on_false})\n")),
            Node::Call { next: Some(n), .. } | Node::Route { next: Some(n), .. } => {
                out.push_str(&format!("({id}->{n})\n"))
            }
            _ => {}
        }
    }
    out.push_str("end\n");

    out.push_str("root\n");
    if let Some(root) = bdd.root() {
        out.push_str(&format!("{root}\n"));
    }
    out.push_str("end\n");

    out
}

fn collect_node_arrays(node: &Node, out: &mut BTreeMap<Arc<str>, Arc<SymbolicArray>>) {
    match node {
        Node::Branch { condition, .. } => condition.arrays(out),
        Node::Call { call, .. } => collect_call_arrays(call, out),
        Node::Route { .. } => {}
    }
}

fn collect_call_arrays(call: &CallRecord, out: &mut BTreeMap<Arc<str>, Arc<SymbolicArray>>) {
    for slot in call.args.values() {
        slot.expr.arrays(out);
        if let Some(i) = &slot.r#in {
            i.arrays(out);
        }
        if let Some(o) = &slot.out {
            o.arrays(out);
        }
    }
    for (i, o) in call.extra_vars.values() {
        i.arrays(out);
        o.arrays(out);
    }
    if let Some(ret) = &call.ret {
        ret.arrays(out);
    }
}

fn serialize_node_payload(node: &Node) -> String {
    match node {
        Node::Branch { condition, .. } => format!("BRANCH {condition}"),
        Node::Call { call, generated_symbols, .. } => {
            let mut s = format!("CALL {}", serialize_call(call));
            s.push_str("=><");
            for (i, sym) in generated_symbols.iter().enumerate() {
                if i > 0 {
                    s.push(',');
                }
                s.push_str(sym);
            }
            s.push('>');
            s
        }
        Node::Route { operation, .. } => match operation {
            RouteOp::Fwd { dst_port } => format!("ROUTE FWD {dst_port}"),
            RouteOp::Drop => "ROUTE DROP".to_string(),
            RouteOp::Bcast => "ROUTE BCAST".to_string(),
        },
    }
}

fn serialize_call(call: &CallRecord) -> String {
    let mut s = format!("{}(", call.name);
    for (i, (name, slot)) in call.args.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        s.push_str(&format!("{name}:{}", slot.expr));
        if let Some(in_val) = &slot.r#in {
            let out_val = slot.out.as_ref().map(|e| e.to_string()).unwrap_or_default();
            s.push_str(&format!("&[{in_val}->{out_val}]"));
        }
    }
    s.push(')');
    if !call.extra_vars.is_empty() {
        s.push('{');
        for (i, (name, (in_val, out_val))) in call.extra_vars.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            s.push_str(&format!("{name}:[{in_val}->{out_val}]"));
        }
        s.push('}');
    }
    if let Some(ret) = &call.ret {
        s.push_str(&format!("->{ret}"));
    }
    s
}

/// Splits `s` on top-level occurrences of `sep` — ignoring anything nested
/// inside `()`, `[]`, or `{}` — the way a hand-rolled parser must, since our
/// expression grammar freely nests all three.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

/// Finds the index of the matching close-bracket for the opener at index 0.
fn matching_close(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

struct ArrayRegistry(BTreeMap<String, Arc<SymbolicArray>>);

impl ArrayRegistry {
    fn get(&self, name: &str) -> Result<Arc<SymbolicArray>, IoError> {
        self.0.get(name).cloned().ok_or_else(|| IoError::UnknownArray(name.to_string()))
    }
}

struct ExprParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    arrays: &'a ArrayRegistry,
}

impl<'a> ExprParser<'a> {
    fn new(s: &'a str, arrays: &'a ArrayRegistry) -> Self {
        ExprParser { bytes: s.as_bytes(), pos: 0, arrays }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, c: char) -> Result<(), IoError> {
        if self.peek() == Some(c as u8) {
            self.pos += 1;
            Ok(())
        } else {
            Err(IoError::Expr(format!("expected '{c}' at byte {}", self.pos)))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ')) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if pred(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).unwrap()
    }

    fn take_literal(&mut self, lit: &str) -> bool {
        if self.bytes[self.pos..].starts_with(lit.as_bytes()) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn parse(&mut self) -> Result<Arc<Expr>, IoError> {
        self.skip_ws();
        match self.peek() {
            Some(b'!') => {
                self.pos += 1;
                let inner = self.parse()?;
                Ok(Arc::new(Expr::Not(inner)))
            }
            Some(b'(') => {
                self.pos += 1;
                let lhs = self.parse()?;
                self.skip_ws();
                let op = self.parse_op()?;
                self.skip_ws();
                let rhs = self.parse()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(make_binop(op, lhs, rhs))
            }
            Some(c) if c.is_ascii_digit() => {
                let value: u64 = self.take_while(|c| c.is_ascii_digit()).parse().map_err(|_| {
                    IoError::Expr("bad integer constant".to_string())
                })?;
                self.expect(':')?;
                self.expect('w')?;
                let width: u32 = self.take_while(|c| c.is_ascii_digit()).parse().map_err(|_| {
                    IoError::Expr("bad width".to_string())
                })?;
                Ok(Arc::new(Expr::Const { value, width }))
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                if self.take_literal("extract(") {
                    let base = self.parse()?;
                    self.skip_ws();
                    self.expect(',')?;
                    self.skip_ws();
                    let offset: u32 = self
                        .take_while(|c| c.is_ascii_digit())
                        .parse()
                        .map_err(|_| IoError::Expr("bad extract offset".to_string()))?;
                    self.skip_ws();
                    self.expect(',')?;
                    self.skip_ws();
                    let width: u32 = self
                        .take_while(|c| c.is_ascii_digit())
                        .parse()
                        .map_err(|_| IoError::Expr("bad extract width".to_string()))?;
                    self.expect(')')?;
                    Ok(Arc::new(Expr::Extract { base, offset, width }))
                } else if self.take_literal("concat(") {
                    let hi = self.parse()?;
                    self.skip_ws();
                    self.expect(',')?;
                    self.skip_ws();
                    let lo = self.parse()?;
                    self.expect(')')?;
                    Ok(Arc::new(Expr::Concat { hi, lo }))
                } else if self.take_literal("ite(") {
                    let cond = self.parse()?;
                    self.skip_ws();
                    self.expect(',')?;
                    self.skip_ws();
                    let t = self.parse()?;
                    self.skip_ws();
                    self.expect(',')?;
                    self.skip_ws();
                    let f = self.parse()?;
                    self.expect(')')?;
                    Ok(Arc::new(Expr::Ite { cond, t, f }))
                } else {
                    let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
                    self.expect('[')?;
                    let index = self.parse()?;
                    self.expect(']')?;
                    let array = self.arrays.get(name)?;
                    Ok(Expr::read(array, index))
                }
            }
            _ => Err(IoError::Expr(format!("unexpected byte at {}", self.pos))),
        }
    }

    fn parse_op(&mut self) -> Result<&'static str, IoError> {
        for op in ["==", "<u", "<s", "+", "-", "*", "&", "|", "^"] {
            if self.take_literal(op) {
                return Ok(match op {
                    "==" => "==",
                    "<u" => "<u",
                    "<s" => "<s",
                    "+" => "+",
                    "-" => "-",
                    "*" => "*",
                    "&" => "&",
                    "|" => "|",
                    "^" => "^",
                    _ => unreachable!(),
                });
            }
        }
        Err(IoError::Expr(format!("unknown binary operator at byte {}", self.pos)))
    }
}

fn make_binop(op: &str, a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    match op {
        "+" => Arc::new(Expr::Add(a, b)),
        "-" => Arc::new(Expr::Sub(a, b)),
        "*" => Arc::new(Expr::Mul(a, b)),
        "==" => Arc::new(Expr::Eq(a, b)),
        "<u" => Arc::new(Expr::Ult(a, b)),
        "<s" => Arc::new(Expr::Slt(a, b)),
        "&" => Arc::new(Expr::And(a, b)),
        "|" => Arc::new(Expr::Or(a, b)),
        "^" => Arc::new(Expr::Xor(a, b)),
        _ => unreachable!(),
    }
}

fn parse_expr(s: &str, arrays: &ArrayRegistry) -> Result<Arc<Expr>, IoError> {
    let mut p = ExprParser::new(s.trim(), arrays);
    let e = p.parse()?;
    p.skip_ws();
    if p.pos != p.bytes.len() {
        return Err(IoError::Expr(format!("trailing input after expression: {:?}", &s[p.pos..])));
    }
    Ok(e)
}

fn parse_call(s: &str, arrays: &ArrayRegistry) -> Result<CallRecord, IoError> {
    let open = s.find('(').ok_or_else(|| IoError::Expr(format!("call missing '(': {s}")))?;
    let name = &s[..open];
    let rest = &s[open..];
    let close = matching_close(rest, '(', ')').ok_or_else(|| IoError::Expr(format!("unbalanced call: {s}")))?;
    let args_str = &rest[1..close];
    let mut tail = &rest[close + 1..];

    let mut call = CallRecord::new(name);

    if !args_str.is_empty() {
        for item in split_top_level(args_str, ',') {
            let colon = item.find(':').ok_or_else(|| IoError::Expr(format!("bad arg `{item}`")))?;
            let arg_name = &item[..colon];
            let value = &item[colon + 1..];
            if let Some(amp) = find_top_level_pair(value, "&[") {
                let expr_part = &value[..amp];
                let bracket_rest = &value[amp + 1..];
                let bracket_close = matching_close(bracket_rest, '[', ']')
                    .ok_or_else(|| IoError::Expr(format!("unbalanced pointer suffix in `{item}`")))?;
                let inner = &bracket_rest[1..bracket_close];
                let arrow = inner.find("->").ok_or_else(|| IoError::Expr(format!("bad pointer pair `{inner}`")))?;
                let in_expr = parse_expr(&inner[..arrow], arrays)?;
                let out_str = inner[arrow + 2..].trim();
                let out_expr = if out_str.is_empty() { None } else { Some(parse_expr(out_str, arrays)?) };
                call = call.with_arg(arg_name, ArgSlot::pointer(parse_expr(expr_part, arrays)?, in_expr, out_expr));
            } else {
                call = call.with_arg(arg_name, ArgSlot::scalar(parse_expr(value, arrays)?));
            }
        }
    }

    if tail.starts_with('{') {
        let close = matching_close(tail, '{', '}').ok_or_else(|| IoError::Expr("unbalanced extras".to_string()))?;
        let extras_str = &tail[1..close];
        for item in split_top_level(extras_str, ',') {
            if item.is_empty() {
                continue;
            }
            let colon = item.find(':').ok_or_else(|| IoError::Expr(format!("bad extra `{item}`")))?;
            let var_name = &item[..colon];
            let bracket_rest = &item[colon + 1..];
            let bclose = matching_close(bracket_rest, '[', ']')
                .ok_or_else(|| IoError::Expr(format!("unbalanced extra pair `{item}`")))?;
            let inner = &bracket_rest[1..bclose];
            let arrow = inner.find("->").ok_or_else(|| IoError::Expr(format!("bad extra pair `{inner}`")))?;
            let in_expr = parse_expr(&inner[..arrow], arrays)?;
            let out_expr = parse_expr(&inner[arrow + 2..], arrays)?;
            call.extra_vars.insert(var_name.into(), (in_expr, out_expr));
        }
        tail = &tail[close + 1..];
    }

    if let Some(r) = tail.strip_prefix("->") {
        call.ret = Some(parse_expr(r, arrays)?);
    }

    Ok(call)
}

/// Finds `pat` at bracket/brace/paren depth 0, returning its byte offset.
fn find_top_level_pair(s: &str, pat: &str) -> Option<usize> {
    let mut depth = 0i32;
    let bytes = s.as_bytes();
    let pat_bytes = pat.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        if depth == 0 && bytes[i..].starts_with(pat_bytes) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn parse_node_payload(
    id: NodeId,
    _n_constraints: usize,
    payload: &str,
    arrays: &ArrayRegistry,
) -> Result<Node, IoError> {
    // §6.2 only stores the constraint *count* per node, not the constraint
    // expressions themselves; a reloaded BDD starts with an empty
    // constraint set, same as the original toolchain's loader (constraints
    // are re-derived by walking the graph, not read back from the file).
    let constraints = ConstraintSet::new();

    let (kind, rest) = payload.split_once(' ').ok_or_else(|| IoError::MalformedLine {
        section: "nodes",
        line: payload.to_string(),
    })?;
    match kind {
        "BRANCH" => Ok(Node::Branch {
            id,
            condition: parse_expr(rest, arrays)?,
            constraints,
            on_true: 0,
            on_false: 0,
            prev: None,
        }),
        "CALL" => {
            let gensym_start = rest
                .rfind("=><")
                .ok_or_else(|| IoError::MalformedLine { section: "nodes", line: payload.to_string() })?;
            let call_str = &rest[..gensym_start];
            let gensyms_str = &rest[gensym_start + 3..];
            let gensyms_str = gensyms_str.strip_suffix('>').unwrap_or(gensyms_str);
            let mut generated_symbols = BTreeSet::new();
            if !gensyms_str.is_empty() {
                for s in gensyms_str.split(',') {
                    generated_symbols.insert(Arc::<str>::from(s));
                }
            }
            Ok(Node::Call {
                id,
                call: parse_call(call_str, arrays)?,
                constraints,
                generated_symbols,
                next: None,
                prev: None,
            })
        }
        "ROUTE" => {
            let operation = if let Some(port) = rest.strip_prefix("FWD ") {
                RouteOp::Fwd {
                    dst_port: port.trim().parse().map_err(|_| IoError::MalformedLine {
                        section: "nodes",
                        line: payload.to_string(),
                    })?,
                }
            } else if rest.trim() == "DROP" {
                RouteOp::Drop
            } else if rest.trim() == "BCAST" {
                RouteOp::Bcast
            } else {
                return Err(IoError::MalformedLine { section: "nodes", line: payload.to_string() });
            };
            Ok(Node::Route { id, operation, constraints, next: None, prev: None })
        }
        _ => Err(IoError::MalformedLine { section: "nodes", line: payload.to_string() }),
    }
}

/// Reads a BDD written by [`write_bdd`], round-trip stable on ids, shapes,
/// and expressions (spec §6.2, invariant 6).
pub fn read_bdd(text: &str) -> Result<Bdd, IoError> {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    if header.trim() != "===== BDD =====" {
        return Err(IoError::MalformedLine { section: "header", line: header.to_string() });
    }

    let mut sections: BTreeMap<&'static str, Vec<&str>> = BTreeMap::new();
    let section_names = ["kQuery", "symbols", "init", "nodes", "edges", "root"];
    let mut remaining = lines.collect::<Vec<_>>();
    let mut cursor = 0;
    for name in section_names {
        while cursor < remaining.len() && remaining[cursor].trim().is_empty() {
            cursor += 1;
        }
        if cursor >= remaining.len() || remaining[cursor].trim() != name {
            return Err(IoError::MissingSection(name));
        }
        cursor += 1;
        let body_start = cursor;
        while cursor < remaining.len() && remaining[cursor].trim() != "end" {
            cursor += 1;
        }
        sections.insert(name, remaining[body_start..cursor].to_vec());
        cursor += 1; // skip "end"
    }
    remaining.clear();

    let mut array_map = BTreeMap::new();
    for line in &sections["kQuery"] {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 || parts[0] != "array" {
            return Err(IoError::MalformedLine { section: "kQuery", line: line.to_string() });
        }
        let name = parts[1];
        let size: usize = parts[2].parse().map_err(|_| IoError::MalformedLine { section: "kQuery", line: line.to_string() })?;
        let index_width: u32 = parts[3].parse().map_err(|_| IoError::MalformedLine { section: "kQuery", line: line.to_string() })?;
        let value_width: u32 = parts[4].parse().map_err(|_| IoError::MalformedLine { section: "kQuery", line: line.to_string() })?;
        array_map.insert(name.to_string(), Arc::new(SymbolicArray::new(name, size, index_width, value_width)));
    }
    let arrays = ArrayRegistry(array_map);

    let symbols_lines = &sections["symbols"];
    if symbols_lines.len() != 3 {
        return Err(IoError::MalformedLine { section: "symbols", line: symbols_lines.join("|") });
    }
    let symbols = DistinguishedSymbols {
        device: parse_expr(symbols_lines[0], &arrays)?,
        packet_len: parse_expr(symbols_lines[1], &arrays)?,
        time: parse_expr(symbols_lines[2], &arrays)?,
    };

    let mut bdd = Bdd::new(symbols);

    for line in &sections["init"] {
        if line.trim().is_empty() {
            continue;
        }
        bdd.init_prelude.push(parse_call(line, &arrays)?);
    }

    for line in &sections["nodes"] {
        if line.trim().is_empty() {
            continue;
        }
        let colon = line.find(':').ok_or_else(|| IoError::MalformedLine { section: "nodes", line: line.to_string() })?;
        let id: NodeId = line[..colon]
            .parse()
            .map_err(|_| IoError::MalformedLine { section: "nodes", line: line.to_string() })?;
        let rest = line[colon + 1..].trim();
        let rest = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| IoError::MalformedLine { section: "nodes", line: line.to_string() })?;
        let (n_constraints_str, payload) =
            rest.split_once(' ').ok_or_else(|| IoError::MalformedLine { section: "nodes", line: line.to_string() })?;
        let n_constraints: usize = n_constraints_str
            .parse()
            .map_err(|_| IoError::MalformedLine { section: "nodes", line: line.to_string() })?;
        let node = parse_node_payload(id, n_constraints, payload, &arrays)?;
        bdd.insert(node);
    }

    for line in &sections["edges"] {
        if line.trim().is_empty() {
            continue;
        }
        let inner = line
            .trim()
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| IoError::MalformedLine { section: "edges", line: line.to_string() })?;
        let parts: Vec<&str> = inner.split("->").collect();
        match parts.as_slice() {
            [parent, child] => {
                let parent: NodeId = parent.parse().map_err(|_| IoError::MalformedLine { section: "edges", line: line.to_string() })?;
                let child: NodeId = child.parse().map_err(|_| IoError::MalformedLine { section: "edges", line: line.to_string() })?;
                if bdd.get_node_by_id(child).is_none() {
                    return Err(IoError::UnknownNode(child));
                }
                if let Some(Node::Branch { .. }) = bdd.get_node_by_id(parent) {
                    return Err(IoError::MalformedLine { section: "edges", line: line.to_string() });
                }
                bdd.relink(parent, true, child);
            }
            [parent, on_true, on_false] => {
                let parent: NodeId = parent.parse().map_err(|_| IoError::MalformedLine { section: "edges", line: line.to_string() })?;
                let on_true: NodeId = on_true.parse().map_err(|_| IoError::MalformedLine { section: "edges", line: line.to_string() })?;
                let on_false: NodeId = on_false.parse().map_err(|_| IoError::MalformedLine { section: "edges", line: line.to_string() })?;
                if bdd.get_node_by_id(on_true).is_none() {
                    return Err(IoError::UnknownNode(on_true));
                }
                if bdd.get_node_by_id(on_false).is_none() {
                    return Err(IoError::UnknownNode(on_false));
                }
                bdd.relink(parent, true, on_true);
                bdd.relink(parent, false, on_false);
            }
            _ => return Err(IoError::MalformedLine { section: "edges", line: line.to_string() }),
        }
    }

    let root_lines = &sections["root"];
    if let Some(first) = root_lines.iter().find(|l| !l.trim().is_empty()) {
        let root: NodeId = first
            .trim()
            .parse()
            .map_err(|_| IoError::MalformedLine { section: "root", line: first.to_string() })?;
        bdd.set_root(root);
    }

    Ok(bdd)
}

#[cfg(test)]
mod tests {
    use super::super::call::CallRecord;
    use super::super::tests_support::symbols;
    use super::*;

    #[test]
    fn round_trip_single_route() {
        let mut bdd = Bdd::new(symbols());
        let id = bdd.alloc_id();
        bdd.insert(Node::Route { id, operation: RouteOp::Drop, constraints: ConstraintSet::new(), next: None, prev: None });
        bdd.set_root(id);

        let text = write_bdd(&bdd);
        let back = read_bdd(&text).expect("round trip parse");
        assert_eq!(back.root(), Some(id));
        assert!(matches!(back.get_node_by_id(id), Some(Node::Route { operation: RouteOp::Drop, .. })));
    }

    #[test]
    fn round_trip_branch_with_call_chain() {
        let array = Arc::new(SymbolicArray::new("packet_chunks", 1500, 32, 8));
        let idx = Expr::constant(0, 32);
        let read_expr = Expr::read(Arc::clone(&array), idx);

        let mut bdd = Bdd::new(symbols());
        let route_t = bdd.alloc_id();
        bdd.insert(Node::Route { id: route_t, operation: RouteOp::Fwd { dst_port: 1 }, constraints: ConstraintSet::new(), next: None, prev: None });
        let route_f = bdd.alloc_id();
        bdd.insert(Node::Route { id: route_f, operation: RouteOp::Drop, constraints: ConstraintSet::new(), next: None, prev: None });

        let branch = bdd.alloc_id();
        bdd.insert(Node::Branch {
            id: branch,
            condition: crate::expr::eq(Arc::clone(&read_expr), Expr::constant(6, 8)),
            constraints: ConstraintSet::new(),
            on_true: route_t,
            on_false: route_f,
            prev: None,
        });
        bdd.relink(branch, true, route_t);
        bdd.relink(branch, false, route_f);

        let call_id = bdd.alloc_id();
        let call = CallRecord::new("map_get").with_arg("map", ArgSlot::scalar(Expr::constant(42, 64)));
        bdd.insert(Node::Call {
            id: call_id,
            call,
            constraints: ConstraintSet::new(),
            generated_symbols: BTreeSet::from([Arc::<str>::from("map_get_result")]),
            next: Some(branch),
            prev: None,
        });
        bdd.relink(call_id, true, branch);
        bdd.set_root(call_id);

        let text = write_bdd(&bdd);
        let back = read_bdd(&text).expect("round trip parse");
        assert_eq!(back.root(), Some(call_id));
        assert_eq!(back.node_count_total(), bdd.node_count_total());
        match back.get_node_by_id(branch).unwrap() {
            Node::Branch { on_true, on_false, condition, .. } => {
                assert_eq!(*on_true, route_t);
                assert_eq!(*on_false, route_f);
                assert_eq!(condition.to_string(), crate::expr::eq(read_expr, Expr::constant(6, 8)).to_string());
            }
            other => panic!("expected branch, got {other:?}"),
        }
    }

    #[test]
    fn round_trip_call_with_pointer_arg_and_extras() {
        let mut call = CallRecord::new("vector_borrow").with_arg(
            "vector",
            ArgSlot::pointer(Expr::constant(7, 64), Expr::constant(0, 32), Some(Expr::constant(1, 32))),
        );
        call.extra_vars.insert("borrowed_cell".into(), (Expr::constant(0, 8), Expr::constant(9, 8)));
        call.ret = Some(Expr::constant(1, 32));

        let serialized = serialize_call(&call);
        let arrays = ArrayRegistry(BTreeMap::new());
        let parsed = parse_call(&serialized, &arrays).expect("parse back");
        assert_eq!(parsed.name, call.name);
        assert_eq!(parsed.args.len(), 1);
        assert_eq!(parsed.extra_vars.len(), 1);
        assert!(parsed.ret.is_some());
    }
}
