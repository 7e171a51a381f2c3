//! Declaration extraction from parsed Rust sources.
//!
//! Structs, enums and type aliases become model, enum and alias declarations. A struct or
//! trait carrying `#[path]` is a controller; its methods come from the `impl` blocks of the
//! same type (or the trait body) and are attached after every file has been visited, so an
//! impl may live in a different file than its struct.
//!
//! Inline `mod name { ... }` blocks open a namespace; file modules do not.
//!
//! # Example
//!
//! ```no_run
//! use swagger_from_source::extractor::{DeclarationExtractor, RustExtractor};
//! use swagger_from_source::parser::AstParser;
//! use std::path::Path;
//!
//! let parsed = AstParser::parse_file(Path::new("src/api.rs")).unwrap();
//! let declarations = RustExtractor.extract(&[parsed]).unwrap();
//! println!("Found {} declarations", declarations.len());
//! ```

pub mod attributes;
pub mod serde_attrs;
pub mod types;

use crate::declaration::{
    date_kind, Annotation, DateKind, Declaration, DeclarationKind, DeclarationSet,
    EnumMember, IndexSignature, Literal, Member, MethodDecl, ModelDecl, ParameterDecl, TypeExpr,
};
use crate::error::{Error, Result};
use crate::parser::ParsedFile;
use attributes::{doc_comment, lower_attributes, AttrArgs};
use log::{debug, info};
use serde_attrs::{RenameRule, SerdeAttrs};
use std::path::{Path, PathBuf};
use syn::visit::Visit;
use syn::{Attribute, Fields, FnArg, Pat};
use types::{discriminant, last_ident, lower_type, map_types, split_optional};

/// Turns parsed sources into declarations.
pub trait DeclarationExtractor {
    /// Extracts every declaration from `parsed_files`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when a generator attribute is malformed.
    fn extract(&self, parsed_files: &[ParsedFile]) -> Result<DeclarationSet>;
}

/// Extractor for plain Rust sources annotated with the generator attributes
pub struct RustExtractor;

impl DeclarationExtractor for RustExtractor {
    fn extract(&self, parsed_files: &[ParsedFile]) -> Result<DeclarationSet> {
        let mut declarations = Vec::new();
        let mut impls = Vec::new();

        for parsed_file in parsed_files {
            let mut visitor = DeclarationVisitor::new(&parsed_file.path);
            visitor.visit_file(&parsed_file.syntax_tree);
            if let Some(message) = visitor.errors.into_iter().next() {
                return Err(Error::Parse {
                    file: parsed_file.path.clone(),
                    message,
                });
            }
            declarations.extend(visitor.declarations);
            impls.extend(visitor.impls);
        }

        for block in impls {
            attach_methods(&mut declarations, block);
        }

        info!("Extracted {} declarations", declarations.len());
        Ok(declarations.into_iter().collect())
    }
}

/// Methods of an `impl` block waiting for their declaration
#[derive(Debug)]
struct PendingImpl {
    namespace: Vec<String>,
    self_name: String,
    methods: Vec<MethodDecl>,
}

fn attach_methods(declarations: &mut [Declaration], block: PendingImpl) {
    let is_target = |decl: &Declaration| decl.name == block.self_name && decl.as_model().is_some();
    let position = declarations
        .iter()
        .position(|decl| is_target(decl) && decl.namespace == block.namespace)
        .or_else(|| {
            let mut candidates = declarations
                .iter()
                .enumerate()
                .filter(|(_, decl)| is_target(*decl));
            match (candidates.next(), candidates.next()) {
                (Some((index, _)), None) => Some(index),
                _ => None,
            }
        });

    match position.and_then(|index| declarations[index].as_model_mut()) {
        Some(model) => {
            debug!(
                "Attaching {} methods to {}",
                block.methods.len(),
                block.self_name
            );
            model.methods.extend(block.methods);
        }
        None => debug!("No model declaration for impl of {}", block.self_name),
    }
}

/// Visitor collecting the declarations of one file
struct DeclarationVisitor<'f> {
    file: &'f Path,
    namespace: Vec<String>,
    declarations: Vec<Declaration>,
    impls: Vec<PendingImpl>,
    errors: Vec<String>,
}

impl<'f> DeclarationVisitor<'f> {
    fn new(file: &'f Path) -> Self {
        Self {
            file,
            namespace: Vec::new(),
            declarations: Vec::new(),
            impls: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn declare(
        &self,
        ident: &syn::Ident,
        generics: &syn::Generics,
        attrs: &[Attribute],
        kind: DeclarationKind,
    ) -> std::result::Result<Declaration, String> {
        let doc = doc_comment(attrs);
        let lowered = lower_attributes(attrs)?;
        let mut declaration = Declaration::new(ident.to_string(), kind);
        declaration.namespace = self.namespace.clone();
        declaration.description = doc.description;
        declaration.type_params = generics
            .type_params()
            .map(|param| param.ident.to_string())
            .collect();
        declaration.annotations = lowered.annotations;
        declaration.annotations.extend(doc.annotations);
        declaration.source = Some(PathBuf::from(self.file));

        for base in &lowered.extends {
            let TypeExpr::Reference(base) = lower_type(base) else {
                return Err(format!("{} can only extend named types", ident));
            };
            match declaration.as_model_mut() {
                Some(model) => model.heritage.push(base),
                None => return Err(format!("#[extends] on {} needs a struct", ident)),
            }
        }
        Ok(declaration)
    }

    fn record(&mut self, result: std::result::Result<Declaration, String>) {
        match result {
            Ok(declaration) => {
                debug!("Found declaration {}", declaration.qualified_name());
                self.declarations.push(declaration);
            }
            Err(message) => self.errors.push(message),
        }
    }

    fn lower_struct(&mut self, node: &syn::ItemStruct) -> std::result::Result<Declaration, String> {
        let container = SerdeAttrs::from_attributes(&node.attrs);
        let kind = match &node.fields {
            Fields::Named(fields) => {
                let mut model = ModelDecl::default();
                for field in &fields.named {
                    lower_field(field, container.rename_all, &mut model)
                        .map_err(|e| format!("{}: {}", node.ident, e))?;
                }
                DeclarationKind::Model(model)
            }
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 && !is_controller(&node.attrs) => {
                DeclarationKind::Alias(lower_type(&fields.unnamed[0].ty))
            }
            Fields::Unnamed(_) if !is_controller(&node.attrs) => {
                DeclarationKind::Alias(TypeExpr::Unsupported(format!("tuple struct {}", node.ident)))
            }
            _ => DeclarationKind::Model(ModelDecl::default()),
        };
        self.declare(&node.ident, &node.generics, &node.attrs, kind)
    }

    fn lower_enum(&mut self, node: &syn::ItemEnum) -> std::result::Result<Declaration, String> {
        let container = SerdeAttrs::from_attributes(&node.attrs);

        let kind = if node.variants.iter().all(|v| matches!(v.fields, Fields::Unit)) {
            let mut members = Vec::new();
            for variant in &node.variants {
                let serde = SerdeAttrs::from_attributes(&variant.attrs);
                if serde.skip {
                    continue;
                }
                let name = variant.ident.to_string();
                let value = variant
                    .discriminant
                    .as_ref()
                    .and_then(|(_, expr)| discriminant(expr))
                    .or_else(|| explicit_value(&variant.attrs).map(Literal::String))
                    .or_else(|| serde.rename.clone().map(Literal::String))
                    .or_else(|| {
                        container
                            .rename_all
                            .map(|rule| Literal::String(rule.apply_to_variant(&name)))
                    });
                members.push(EnumMember { name, value });
            }
            DeclarationKind::Enum(members)
        } else if node.variants.iter().all(|v| v.fields.len() == 1 && matches!(v.fields, Fields::Unnamed(_))) {
            let mut variants: Vec<TypeExpr> = node
                .variants
                .iter()
                .filter_map(|v| v.fields.iter().next())
                .map(|field| lower_type(&field.ty))
                .collect();
            if variants.len() == 1 {
                DeclarationKind::Alias(variants.remove(0))
            } else {
                DeclarationKind::Alias(TypeExpr::Union(variants))
            }
        } else {
            DeclarationKind::Alias(TypeExpr::Unsupported(format!(
                "enum {} with struct variants",
                node.ident
            )))
        };
        self.declare(&node.ident, &node.generics, &node.attrs, kind)
    }

    fn lower_impl(&mut self, node: &syn::ItemImpl) -> std::result::Result<(), String> {
        let Some(self_name) = last_ident(&node.self_ty) else {
            return Ok(());
        };
        let mut methods = Vec::new();
        for item in &node.items {
            if let syn::ImplItem::Fn(function) = item {
                methods.push(lower_method(&function.sig, &function.attrs)?);
            }
        }
        if !methods.is_empty() {
            self.impls.push(PendingImpl {
                namespace: self.namespace.clone(),
                self_name,
                methods,
            });
        }
        Ok(())
    }

    fn lower_trait(&mut self, node: &syn::ItemTrait) -> std::result::Result<Declaration, String> {
        let mut model = ModelDecl::default();
        for item in &node.items {
            if let syn::TraitItem::Fn(function) = item {
                model.methods.push(lower_method(&function.sig, &function.attrs)?);
            }
        }
        self.declare(
            &node.ident,
            &node.generics,
            &node.attrs,
            DeclarationKind::Model(model),
        )
    }
}

impl<'ast, 'f> Visit<'ast> for DeclarationVisitor<'f> {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if node.content.is_some() {
            self.namespace.push(node.ident.to_string());
            syn::visit::visit_item_mod(self, node);
            self.namespace.pop();
        }
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        let result = self.lower_struct(node);
        self.record(result);
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        let result = self.lower_enum(node);
        self.record(result);
    }

    fn visit_item_type(&mut self, node: &'ast syn::ItemType) {
        let kind = DeclarationKind::Alias(lower_type(&node.ty));
        let result = self.declare(&node.ident, &node.generics, &node.attrs, kind);
        self.record(result);
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        // only controller traits describe endpoints
        if is_controller(&node.attrs) {
            let result = self.lower_trait(node);
            self.record(result);
        }
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        if let Err(message) = self.lower_impl(node) {
            self.errors.push(message);
        }
    }

    // items local to function bodies are not part of the API
    fn visit_item_fn(&mut self, _node: &'ast syn::ItemFn) {}
}

fn is_controller(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident("path"))
}

/// `#[value("...")]` on an enum variant.
fn explicit_value(attrs: &[Attribute]) -> Option<String> {
    let attr = attrs.iter().find(|attr| attr.path().is_ident("value"))?;
    AttrArgs::from_attribute(attr).ok()?.first_string()
}

fn field_name(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}

/// Date-only Rust types carry a date hint unless one is given explicitly.
fn intrinsic_annotations(ty: &syn::Type, annotations: &mut Vec<Annotation>) {
    let is_date_only = matches!(last_ident(ty).as_deref(), Some("NaiveDate") | Some("Date"));
    if is_date_only && date_kind(annotations).is_none() {
        annotations.push(Annotation::DateFormat(DateKind::Date));
    }
}

fn lower_field(
    field: &syn::Field,
    rename_all: Option<RenameRule>,
    model: &mut ModelDecl,
) -> std::result::Result<(), String> {
    let Some(ident) = &field.ident else {
        return Ok(());
    };
    let serde = SerdeAttrs::from_attributes(&field.attrs);
    if serde.skip {
        return Ok(());
    }
    let (inner, optional) = split_optional(&field.ty);

    if serde.flatten {
        if let Some((key, value)) = map_types(inner) {
            model.index_signatures.push(IndexSignature {
                key: lower_type(key),
                value: lower_type(value),
            });
            return Ok(());
        }
        return match lower_type(inner) {
            TypeExpr::Reference(base) => {
                model.heritage.push(base);
                Ok(())
            }
            _ => Err(format!("cannot flatten field {}", ident)),
        };
    }

    let source_name = field_name(ident);
    let name = serde
        .rename
        .or_else(|| rename_all.map(|rule| rule.apply_to_field(&source_name)))
        .unwrap_or(source_name);

    let doc = doc_comment(&field.attrs);
    let mut annotations = lower_attributes(&field.attrs)?.annotations;
    annotations.extend(doc.annotations);
    intrinsic_annotations(inner, &mut annotations);

    model.members.push(Member {
        name,
        ty: lower_type(inner),
        optional: optional || serde.default,
        description: doc.description,
        annotations,
    });
    Ok(())
}

fn lower_method(sig: &syn::Signature, attrs: &[Attribute]) -> std::result::Result<MethodDecl, String> {
    let doc = doc_comment(attrs);
    let lowered = lower_attributes(attrs).map_err(|e| format!("{}: {}", sig.ident, e))?;

    let return_type = match &sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => Some(lower_type(ty)),
    };
    let mut method = MethodDecl::new(sig.ident.to_string(), return_type);
    method.description = doc.description;
    method.annotations = lowered.annotations;
    method.annotations.extend(doc.annotations);

    for (index, input) in sig.inputs.iter().enumerate() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let name = match pat_type.pat.as_ref() {
            Pat::Ident(pat) => field_name(&pat.ident),
            _ => format!("arg{}", index),
        };
        let (inner, optional) = split_optional(&pat_type.ty);
        let param_doc = doc_comment(&pat_type.attrs);
        let param_attrs = lower_attributes(&pat_type.attrs)
            .map_err(|e| format!("{}({}): {}", sig.ident, name, e))?;

        let mut parameter = ParameterDecl::new(name, lower_type(inner));
        parameter.optional = optional;
        parameter.default = param_attrs.default;
        parameter.description = param_doc.description;
        parameter.annotations = param_attrs.annotations;
        parameter.annotations.extend(param_doc.annotations);
        intrinsic_annotations(inner, &mut parameter.annotations);
        method.parameters.push(parameter);
    }

    Ok(method)
}
