// Copyright 2023 Datafuse Labs.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Struct binding and field dispatch.
//!
//! Describing a struct flattens embedded fields, applies tags and resolves
//! name conflicts. Decoding then maps each incoming key to a binding, by
//! comparing 32-bit FNV-1a hashes when the struct is small and the hashes
//! are distinct, and through a hash map otherwise.

use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use ahash::AHashMap;
use smallvec::SmallVec;

use super::compiler::Compiler;
use super::decoder::expect_type;
use super::ValDecoder;
use super::ValEncoder;
use crate::constants::MAX_HASHED_FIELDS;
use crate::constants::SENTINEL_HASH;
use crate::error::Error;
use crate::error::Result;
use crate::extension::Binding;
use crate::extension::StructDescriptor;
use crate::reflect::mismatch;
use crate::reflect::FieldInfo;
use crate::reflect::StructInfo;
use crate::reflect::TypeInfo;
use crate::reflect::TypeKind;
use crate::tokenizer::Tokenizer;
use crate::tokenizer::ValueType;
use crate::writer::Writer;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a of a field name, ASCII lowercased unless `case_sensitive`.
pub fn field_hash(name: &str, case_sensitive: bool) -> u32 {
    let mut hash = FNV_OFFSET;
    for &b in name.as_bytes() {
        let b = if case_sensitive {
            b
        } else {
            b.to_ascii_lowercase()
        };
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A parsed field tag such as `"name,omitempty,string"`.
#[derive(Debug, Default, PartialEq, Eq)]
struct Tag<'a> {
    name: Option<&'a str>,
    skip: bool,
    omit_empty: bool,
    quoted: bool,
}

fn parse_tag(tag: &str) -> Tag<'_> {
    if tag == "-" {
        return Tag {
            skip: true,
            ..Default::default()
        };
    }
    let mut parts = tag.split(',');
    let name = parts.next().filter(|name| !name.is_empty());
    let mut parsed = Tag {
        name,
        ..Default::default()
    };
    for option in parts {
        match option.trim() {
            "omitempty" => parsed.omit_empty = true,
            "string" => parsed.quoted = true,
            _ => {}
        }
    }
    parsed
}

/// One hop from a value to a value nested inside it.
#[derive(Clone, Copy)]
struct Step {
    get: fn(&dyn Any) -> Option<&dyn Any>,
    get_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

/// How to reach a (possibly embedded) field from the outer struct.
#[derive(Clone, Default)]
pub struct FieldPath {
    steps: SmallVec<[Step; 2]>,
}

impl FieldPath {
    fn push(&mut self, get: fn(&dyn Any) -> Option<&dyn Any>, get_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>) {
        self.steps.push(Step { get, get_mut });
    }

    /// Follows the path. `None` when an embedded `Option` on the way is empty.
    pub(crate) fn resolve<'a>(&self, mut v: &'a dyn Any) -> Option<&'a dyn Any> {
        for step in &self.steps {
            v = (step.get)(v)?;
        }
        Some(v)
    }

    /// Follows the path, filling empty embedded `Option`s on the way.
    pub(crate) fn resolve_mut<'a>(&self, mut v: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        for step in &self.steps {
            v = (step.get_mut)(v)?;
        }
        Some(v)
    }
}

/// The struct an embedded field flattens into, with the hops needed to get
/// through `Box` and `Option` wrappers.
fn embedded_struct(ty: &TypeInfo, path: &mut FieldPath) -> Option<(TypeId, StructInfo)> {
    let mut ty = ty.clone();
    loop {
        match ty.kind {
            TypeKind::Struct(info) => return Some((ty.id, info)),
            TypeKind::Pointer(info) => {
                path.push(info.get, info.get_mut);
                ty = (info.inner)();
            }
            TypeKind::Optional(info) => {
                path.push(info.get, info.get_or_insert);
                ty = (info.inner)();
            }
            _ => return None,
        }
    }
}

struct Candidate {
    binding: Binding,
    depth: usize,
    tagged: bool,
}

fn collect(
    fields: &[FieldInfo],
    base: &FieldPath,
    prefix: &str,
    depth: usize,
    only_tagged: bool,
    visiting: &mut Vec<TypeId>,
    out: &mut Vec<Candidate>,
) {
    for field in fields {
        let tag = field.tag.map(parse_tag).unwrap_or_default();
        if tag.skip {
            continue;
        }
        let ty = (field.ty)();
        let mut path = base.clone();
        path.push(field.get, field.get_mut);
        let dotted = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        if field.embedded && tag.name.is_none() {
            let mut inner_path = path.clone();
            if let Some((id, info)) = embedded_struct(&ty, &mut inner_path) {
                // an embedded type that embeds itself again contributes nothing new
                if !visiting.contains(&id) {
                    visiting.push(id);
                    collect(&info.fields, &inner_path, &dotted, depth + 1, only_tagged, visiting, out);
                    visiting.pop();
                }
                continue;
            }
        }
        if only_tagged && field.tag.is_none() {
            continue;
        }

        let name = tag.name.unwrap_or(field.name).to_string();
        let quoted = tag.quoted && ty.kind.is_quotable();
        out.push(Candidate {
            binding: Binding {
                field: dotted,
                from_names: vec![name.clone()],
                to_names: vec![name],
                omit_empty: tag.omit_empty,
                quoted,
                decoder: None,
                encoder: None,
                ty,
                path,
            },
            depth,
            tagged: tag.name.is_some(),
        });
    }
}

/// Keeps one binding per output name: the shallowest wins, then the tagged
/// one, and a full tie drops every contender.
fn resolve_conflicts(candidates: Vec<Candidate>) -> Vec<Binding> {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, c) in candidates.iter().enumerate() {
        groups
            .entry(c.binding.to_names[0].clone())
            .or_default()
            .push(idx);
    }
    let mut keep = HashSet::new();
    for members in groups.values() {
        if members.len() == 1 {
            keep.insert(members[0]);
            continue;
        }
        let min_depth = members
            .iter()
            .map(|idx| candidates[*idx].depth)
            .min()
            .unwrap_or(0);
        let dominant: Vec<usize> = members
            .iter()
            .copied()
            .filter(|idx| candidates[*idx].depth == min_depth)
            .collect();
        if dominant.len() == 1 {
            keep.insert(dominant[0]);
            continue;
        }
        let tagged: Vec<usize> = dominant
            .into_iter()
            .filter(|idx| candidates[*idx].tagged)
            .collect();
        if tagged.len() == 1 {
            keep.insert(tagged[0]);
        }
    }
    candidates
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep.contains(idx))
        .map(|(_, c)| c.binding)
        .collect()
}

/// Builds the descriptor of a struct and lets every extension edit it.
pub(super) fn describe(compiler: &Compiler<'_>, ty: &TypeInfo, info: &StructInfo) -> StructDescriptor {
    let mut candidates = Vec::new();
    let mut visiting = vec![ty.id];
    collect(
        &info.fields,
        &FieldPath::default(),
        "",
        0,
        compiler.config().only_tagged_fields,
        &mut visiting,
        &mut candidates,
    );
    let mut desc = StructDescriptor {
        ty: ty.clone(),
        bindings: resolve_conflicts(candidates),
    };
    for ext in compiler.extensions() {
        ext.update_struct_descriptor(&mut desc);
    }
    desc
}

/// Which lookup a struct decoder uses for incoming keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// No decodable fields; objects are skipped whole.
    Empty,
    /// Linear scan over precomputed name hashes.
    Hashed,
    /// Hash map from normalized name to field.
    General,
}

struct HashedField {
    hash: u32,
    name: String,
    index: usize,
}

enum Dispatch {
    Empty,
    Hashed(SmallVec<[HashedField; MAX_HASHED_FIELDS]>),
    General(AHashMap<String, usize>),
}

struct FieldDecoder {
    field: String,
    path: FieldPath,
    decoder: Arc<ValDecoder>,
}

/// Decoder for a struct type.
pub struct StructDecoder {
    id: TypeId,
    owner: &'static str,
    fields: Vec<FieldDecoder>,
    dispatch: Dispatch,
    case_sensitive: bool,
    disallow_unknown: bool,
}

impl StructDecoder {
    pub(super) fn build(compiler: &mut Compiler<'_>, ty: &TypeInfo, info: &StructInfo) -> StructDecoder {
        let desc = describe(compiler, ty, info);
        let case_sensitive = compiler.config().case_sensitive;
        let mut fields = Vec::new();
        // normalized name -> field index, first binding wins
        let mut names: Vec<(String, usize)> = Vec::new();
        for binding in desc.bindings {
            if binding.from_names.is_empty() {
                continue;
            }
            let decoder = match &binding.decoder {
                Some(ext) => Arc::new(ValDecoder::Extension(ext.clone())),
                None => {
                    let dec = compiler.decoder(&binding.ty);
                    if binding.quoted {
                        Arc::new(ValDecoder::Quoted(dec))
                    } else {
                        dec
                    }
                }
            };
            let index = fields.len();
            for name in &binding.from_names {
                let name = if case_sensitive {
                    name.clone()
                } else {
                    name.to_ascii_lowercase()
                };
                if !names.iter().any(|(n, _)| *n == name) {
                    names.push((name, index));
                }
            }
            fields.push(FieldDecoder {
                field: binding.field,
                path: binding.path,
                decoder,
            });
        }
        StructDecoder {
            id: ty.id,
            owner: ty.short_name(),
            fields,
            dispatch: Self::dispatch_for(names, case_sensitive),
            case_sensitive,
            disallow_unknown: compiler.config().disallow_unknown_fields,
        }
    }

    fn dispatch_for(names: Vec<(String, usize)>, case_sensitive: bool) -> Dispatch {
        if names.is_empty() {
            return Dispatch::Empty;
        }
        if names.len() <= MAX_HASHED_FIELDS {
            let hashed: SmallVec<[HashedField; MAX_HASHED_FIELDS]> = names
                .iter()
                .map(|(name, index)| HashedField {
                    hash: field_hash(name, case_sensitive),
                    name: name.clone(),
                    index: *index,
                })
                .collect();
            let distinct = hashed.iter().enumerate().all(|(i, f)| {
                f.hash != SENTINEL_HASH && hashed[..i].iter().all(|other| other.hash != f.hash)
            });
            if distinct {
                return Dispatch::Hashed(hashed);
            }
        }
        Dispatch::General(names.into_iter().collect())
    }

    pub fn dispatch(&self) -> DispatchKind {
        match self.dispatch {
            Dispatch::Empty => DispatchKind::Empty,
            Dispatch::Hashed(_) => DispatchKind::Hashed,
            Dispatch::General(_) => DispatchKind::General,
        }
    }

    fn lookup(&self, key: &str) -> Option<usize> {
        match &self.dispatch {
            Dispatch::Empty => None,
            Dispatch::Hashed(fields) => {
                let hash = field_hash(key, self.case_sensitive);
                let field = fields.iter().find(|f| f.hash == hash)?;
                let matched = if self.case_sensitive {
                    field.name == key
                } else {
                    field.name.eq_ignore_ascii_case(key)
                };
                matched.then_some(field.index)
            }
            Dispatch::General(map) => {
                if self.case_sensitive || !key.bytes().any(|b| b.is_ascii_uppercase()) {
                    map.get(key).copied()
                } else {
                    map.get(&key.to_ascii_lowercase()).copied()
                }
            }
        }
    }

    pub(super) fn decode(&self, dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
        if (*dst).type_id() != self.id {
            return Err(mismatch(self.owner));
        }
        if iter.read_nil()? {
            return Ok(());
        }
        expect_type(iter, ValueType::Object)?;
        if matches!(self.dispatch, Dispatch::Empty) && !self.disallow_unknown {
            return iter.skip();
        }
        if !iter.read_object_begin()? {
            return Ok(());
        }
        loop {
            let found = {
                let key = iter.read_field_name()?;
                match self.lookup(key) {
                    Some(idx) => Ok(idx),
                    None => Err(self.disallow_unknown.then(|| key.to_string())),
                }
            };
            match found {
                Ok(idx) => {
                    let field = &self.fields[idx];
                    let slot = field
                        .path
                        .resolve_mut(dst)
                        .ok_or_else(|| mismatch(self.owner))?;
                    field
                        .decoder
                        .decode(slot, iter)
                        .map_err(|e| e.in_field(self.owner, field.field.as_str()))?;
                }
                Err(Some(key)) => return Err(iter.report(Error::UnknownField(key))),
                Err(None) => iter.skip()?,
            }
            if !iter.read_object_more()? {
                return Ok(());
            }
        }
    }
}

struct FieldEncoder {
    field: String,
    name: String,
    path: FieldPath,
    omit_empty: bool,
    encoder: Arc<ValEncoder>,
}

/// Encoder for a struct type. Fields are written in declared order.
pub struct StructEncoder {
    id: TypeId,
    owner: &'static str,
    fields: Vec<FieldEncoder>,
}

impl StructEncoder {
    pub(super) fn build(compiler: &mut Compiler<'_>, ty: &TypeInfo, info: &StructInfo) -> StructEncoder {
        let desc = describe(compiler, ty, info);
        let mut fields = Vec::new();
        for binding in desc.bindings {
            let Some(name) = binding.to_names.first().cloned() else {
                continue;
            };
            let encoder = match &binding.encoder {
                Some(ext) => Arc::new(ValEncoder::Extension(ext.clone())),
                None => {
                    let enc = compiler.encoder(&binding.ty);
                    if binding.quoted {
                        Arc::new(ValEncoder::Quoted(enc))
                    } else {
                        enc
                    }
                }
            };
            fields.push(FieldEncoder {
                field: binding.field,
                name,
                path: binding.path,
                omit_empty: binding.omit_empty,
                encoder,
            });
        }
        StructEncoder {
            id: ty.id,
            owner: ty.short_name(),
            fields,
        }
    }

    /// Output names in the order they are written.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub(super) fn encode(&self, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
        if (*src).type_id() != self.id {
            return Err(mismatch(self.owner));
        }
        w.enter()?;
        let mut first = true;
        for field in &self.fields {
            let Some(value) = field.path.resolve(src) else {
                continue;
            };
            if field.omit_empty && field.encoder.is_empty(value) {
                continue;
            }
            if first {
                w.write_object_start();
                first = false;
            } else {
                w.write_more();
            }
            w.write_object_field(&field.name);
            field
                .encoder
                .encode(value, w)
                .map_err(|e| e.in_field(self.owner, field.field.as_str()))?;
        }
        if first {
            w.write_empty_object();
        } else {
            w.write_object_end();
        }
        w.leave();
        Ok(())
    }
}
