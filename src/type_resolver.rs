use crate::declaration::{
    date_kind, enum_values, numeric_kind, Annotated, Annotation, DateKind, Declaration,
    DeclarationKind, DeclarationProvider, Keyword, Literal, Member, NumericKind, TypeExpr,
    TypeRef,
};
use crate::error::{Error, Result};
use crate::metadata::{
    CombinatorKind, Controller, PrimitiveKind, Property, ReferenceType, Type, TypeReference,
};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Response wrapper markers whose type argument becomes the response schema
pub const RESPONSE_WRAPPERS: [&str; 4] = [
    "NewResource",
    "RequestAccepted",
    "MovedPermanently",
    "MovedTemporarily",
];

/// An actual type bound to a generic type parameter
#[derive(Debug, Clone, PartialEq)]
pub struct GenericArg {
    /// The argument resolved in the caller's context
    pub ty: Type,
    /// Name fragment rendered into the cache key of the instantiated type (`String`, `PersonArray`)
    pub label: String,
}

/// Generic parameter name to bound argument
pub type GenericBindings = HashMap<String, GenericArg>;

/// Where a type expression is being resolved from
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s> {
    /// Namespace of the declaration containing the expression
    pub namespace: &'s [String],
    pub bindings: &'s GenericBindings,
    /// Annotations of the member or parameter typed by the expression
    pub annotations: &'s [Annotation],
}

impl<'s> Scope<'s> {
    pub fn new(namespace: &'s [String], bindings: &'s GenericBindings) -> Self {
        Self {
            namespace,
            bindings,
            annotations: &[],
        }
    }

    pub fn with_annotations(self, annotations: &'s [Annotation]) -> Self {
        Self {
            annotations,
            ..self
        }
    }

    /// Annotations only refine the outermost expression.
    fn nested(self) -> Self {
        self.with_annotations(&[])
    }
}

/// Type resolver - turns declared type expressions into resolved [`Type`]s.
///
/// Named composites are resolved once and kept in an arena keyed by qualified name plus
/// rendered generic arguments; every later use gets a [`Type::Reference`] handle to the same
/// entry. A reference met again while its own members are still being resolved yields a
/// [`Type::Circular`] placeholder, rewritten into a handle by [`TypeResolver::finish`].
///
/// One resolver serves exactly one generation run.
pub struct TypeResolver<'a, P: DeclarationProvider + ?Sized> {
    provider: &'a P,
    /// Completed reference types, in completion order
    completed: IndexMap<String, ReferenceType>,
    /// Keys whose members are currently being resolved
    in_progress: HashSet<String>,
    /// Keys handed out as circular placeholders
    pending: Vec<String>,
}

impl<'a, P: DeclarationProvider + ?Sized> TypeResolver<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        debug!(
            "Initializing TypeResolver with {} declarations",
            provider.declarations().len()
        );
        Self {
            provider,
            completed: IndexMap::new(),
            in_progress: HashSet::new(),
            pending: Vec::new(),
        }
    }

    /// Completed reference type by key, if resolved already.
    pub fn reference_type(&self, key: &str) -> Option<&ReferenceType> {
        self.completed.get(key)
    }

    /// Resolves a type expression. An absent expression is `void`.
    pub fn resolve(&mut self, expr: Option<&TypeExpr>, scope: Scope<'_>) -> Result<Type> {
        let Some(expr) = expr else {
            return Ok(Type::Primitive(PrimitiveKind::Void));
        };

        match expr {
            TypeExpr::Keyword(keyword) => Ok(Self::resolve_keyword(keyword, scope.annotations)),
            TypeExpr::Array(element) => Ok(Type::Array(Box::new(
                self.resolve(Some(element.as_ref()), scope.nested())?,
            ))),
            TypeExpr::Any | TypeExpr::ObjectKeyword => Ok(Type::Primitive(PrimitiveKind::Object)),
            TypeExpr::TypeLiteral(members) => {
                Ok(Type::Object(self.resolve_members(members, scope.nested())?))
            }
            TypeExpr::Union(members) => self.resolve_union(members, scope.nested()),
            TypeExpr::Intersection(members) => Ok(Type::Combinator(
                CombinatorKind::AllOf,
                self.resolve_all(members, scope.nested())?,
            )),
            TypeExpr::Parenthesized(inner) => self.resolve(Some(inner.as_ref()), scope),
            TypeExpr::Literal(literal) => Ok(Type::Enum(vec![literal.to_value()])),
            TypeExpr::Reference(reference) => self.resolve_reference(reference, scope),
            TypeExpr::Function => Err(Error::UnsupportedType {
                description: "function type".to_string(),
            }),
            TypeExpr::Unsupported(description) => Err(Error::UnsupportedType {
                description: description.clone(),
            }),
        }
    }

    /// Resolves a type name from the root namespace without generic bindings.
    pub fn resolve_named(&mut self, name: &str) -> Result<Type> {
        let bindings = GenericBindings::new();
        self.resolve(Some(&TypeExpr::named(name)), Scope::new(&[], &bindings))
    }

    /// Resolves model members into properties, skipping hidden and callable members.
    pub fn resolve_members(&mut self, members: &[Member], scope: Scope<'_>) -> Result<Vec<Property>> {
        let mut properties = Vec::with_capacity(members.len());
        for member in members {
            if matches!(member.ty, TypeExpr::Function) || member.is_hidden() {
                debug!("Skipping member {}", member.name);
                continue;
            }
            let ty = self.resolve(Some(&member.ty), scope.with_annotations(&member.annotations))?;
            properties.push(Property {
                name: member.name.clone(),
                description: member.description.clone(),
                ty,
                required: !member.optional,
            });
        }
        Ok(properties)
    }

    /// Builds the bindings for the type parameters of `owner` from the actual `args` written
    /// at the use site.
    pub fn bind_generics(
        &mut self,
        owner: &Declaration,
        args: &[TypeExpr],
        scope: Scope<'_>,
    ) -> Result<GenericBindings> {
        let mut bindings = GenericBindings::new();
        for (param, arg) in owner.type_params.iter().zip(args) {
            let ty = self.resolve(Some(arg), scope.nested())?;
            let label = self.label(arg, scope, &owner.namespace)?;
            bindings.insert(param.clone(), GenericArg { ty, label });
        }
        Ok(bindings)
    }

    /// Replaces every circular placeholder with a handle to its completed reference type and
    /// returns the completed reference types.
    pub fn finish(mut self, controllers: &mut [Controller]) -> IndexMap<String, ReferenceType> {
        debug!(
            "Finalizing {} circular references over {} reference types",
            self.pending.len(),
            self.completed.len()
        );
        let known: HashSet<String> = self.completed.keys().cloned().collect();
        let mut rewrite = |ty: &mut Type| {
            if let Type::Circular(key) = ty {
                if !known.contains(key.as_str()) {
                    warn!("Circular reference {} was never completed", key);
                }
                *ty = Type::reference(key.clone());
            }
        };
        for reference_type in self.completed.values_mut() {
            reference_type.walk_mut(&mut rewrite);
        }
        for controller in controllers.iter_mut() {
            controller.walk_mut(&mut rewrite);
        }
        self.completed
    }

    fn resolve_keyword(keyword: &Keyword, annotations: &[Annotation]) -> Type {
        match keyword {
            Keyword::String => match enum_values(annotations) {
                Some(values) => Type::Enum(values.to_vec()),
                None => Type::Primitive(PrimitiveKind::String),
            },
            Keyword::Number(intrinsic) => {
                let kind = match numeric_kind(annotations).or(*intrinsic) {
                    Some(NumericKind::Int) => PrimitiveKind::Integer,
                    Some(NumericKind::Long) => PrimitiveKind::Long,
                    Some(NumericKind::Float) => PrimitiveKind::Float,
                    Some(NumericKind::Double) | None => PrimitiveKind::Double,
                };
                Type::Primitive(kind)
            }
            Keyword::Boolean => Type::Primitive(PrimitiveKind::Boolean),
            Keyword::Void => Type::Primitive(PrimitiveKind::Void),
        }
    }

    fn resolve_all(&mut self, members: &[TypeExpr], scope: Scope<'_>) -> Result<Vec<Type>> {
        members
            .iter()
            .map(|member| self.resolve(Some(member), scope))
            .collect()
    }

    fn resolve_union(&mut self, members: &[TypeExpr], scope: Scope<'_>) -> Result<Type> {
        if let Some(literals) = TypeExpr::literal_union(members) {
            return Ok(Type::Enum(literals.iter().map(|l| l.to_value()).collect()));
        }
        Ok(Type::Combinator(
            CombinatorKind::OneOf,
            self.resolve_all(members, scope)?,
        ))
    }

    fn single_argument<'r>(reference: &'r TypeRef) -> Result<&'r TypeExpr> {
        reference.args.first().ok_or_else(|| Error::UnsupportedType {
            description: format!("{} without a type argument", reference.name),
        })
    }

    fn resolve_reference(&mut self, reference: &TypeRef, scope: Scope<'_>) -> Result<Type> {
        if reference.args.is_empty() {
            if let Some(bound) = scope.bindings.get(&reference.name) {
                debug!("Substituting generic parameter {}", reference.name);
                return Ok(bound.ty.clone());
            }
        }

        let name = reference.simple_name();
        match name {
            "Date" => {
                let kind = match date_kind(scope.annotations) {
                    Some(DateKind::Date) => PrimitiveKind::Date,
                    _ => PrimitiveKind::DateTime,
                };
                return Ok(Type::Primitive(kind));
            }
            "Buffer" | "DownloadBinaryData" | "DownloadResource" => {
                return Ok(Type::Primitive(PrimitiveKind::Buffer))
            }
            "Partial" => {
                let inner = Self::single_argument(reference)?;
                let resolved = self.resolve(Some(inner), scope.nested())?;
                if let Type::Reference(handle) = &resolved {
                    if let Some(reference_type) = self.completed.get_mut(&handle.name) {
                        debug!("Marking properties of {} optional", handle.name);
                        for property in &mut reference_type.properties {
                            property.required = false;
                        }
                    }
                }
                return Ok(resolved);
            }
            "Promise" => {
                let inner = Self::single_argument(reference)?;
                return self.resolve(Some(inner), scope);
            }
            "Array" => {
                let inner = Self::single_argument(reference)?;
                return Ok(Type::Array(Box::new(self.resolve(Some(inner), scope.nested())?)));
            }
            _ => {}
        }

        if RESPONSE_WRAPPERS.contains(&name) && reference.args.len() == 1 {
            let argument = self.resolve(Some(&reference.args[0]), scope.nested())?;
            return Ok(Type::Reference(TypeReference {
                name: name.to_string(),
                type_argument: Some(Box::new(argument)),
            }));
        }

        let provider = self.provider;
        let declaration = provider
            .lookup(&reference.name, scope.namespace)?
            .ok_or_else(|| Error::MissingDeclaration {
                name: reference.name.clone(),
            })?;

        match &declaration.kind {
            DeclarationKind::Enum(members) => {
                debug!("Resolved {} as enum", declaration.qualified_name());
                let values = members
                    .iter()
                    .enumerate()
                    .map(|(index, member)| match &member.value {
                        Some(literal) => literal.to_value(),
                        None => Value::from(index),
                    })
                    .collect();
                Ok(Type::Enum(values))
            }
            DeclarationKind::Alias(TypeExpr::Union(members))
                if matches!(
                    TypeExpr::literal_union(members).as_deref(),
                    Some([Literal::String(_), ..])
                ) =>
            {
                debug!("Resolved {} as string literal union", declaration.qualified_name());
                self.resolve_union(members, scope.nested())
            }
            _ => self.resolve_reference_type(declaration, &reference.args, scope),
        }
    }

    /// Resolves a model or alias declaration into a cached reference type.
    fn resolve_reference_type(
        &mut self,
        declaration: &'a Declaration,
        args: &[TypeExpr],
        scope: Scope<'_>,
    ) -> Result<Type> {
        let bindings = self.bind_generics(declaration, args, scope)?;
        let mut key = declaration.qualified_name();
        for param in &declaration.type_params {
            if let Some(arg) = bindings.get(param) {
                key.push_str(&arg.label);
            }
        }

        if self.completed.contains_key(&key) {
            debug!("Type {} found in cache", key);
            return Ok(Type::reference(key));
        }
        if self.in_progress.contains(&key) {
            debug!("Circular reference detected for type: {}", key);
            self.pending.push(key.clone());
            return Ok(Type::Circular(key));
        }

        debug!("Resolving reference type: {}", key);
        self.in_progress.insert(key.clone());
        let built = self
            .build_reference_type(declaration, &key, &bindings)
            .map_err(|e| e.resolving(&key));
        self.in_progress.remove(&key);

        let reference_type = built?;
        self.completed.insert(key.clone(), reference_type);
        Ok(Type::reference(key))
    }

    fn build_reference_type(
        &mut self,
        declaration: &'a Declaration,
        key: &str,
        bindings: &GenericBindings,
    ) -> Result<ReferenceType> {
        let scope = Scope::new(&declaration.namespace, bindings);
        let mut reference_type = ReferenceType {
            name: key.to_string(),
            description: declaration.description.clone(),
            properties: Vec::new(),
            additional_properties: Vec::new(),
            type_alias: None,
        };

        match &declaration.kind {
            DeclarationKind::Alias(aliased) => {
                reference_type.type_alias = Some(self.resolve(Some(aliased), scope)?);
            }
            DeclarationKind::Model(model) => {
                let properties = self.resolve_members(&model.members, scope)?;

                for signature in &model.index_signatures {
                    let key_type = self.resolve(Some(&signature.key), scope)?;
                    if key_type != Type::Primitive(PrimitiveKind::String) {
                        return Err(Error::NonStringIndexer {
                            name: key.to_string(),
                            found: key_type.type_name().to_string(),
                        });
                    }
                    reference_type.additional_properties.push(Property {
                        name: String::new(),
                        description: String::new(),
                        ty: self.resolve(Some(&signature.value), scope)?,
                        required: true,
                    });
                }

                if model.heritage.is_empty() {
                    reference_type.properties = properties;
                } else {
                    let mut members = Vec::with_capacity(model.heritage.len() + 1);
                    for parent in &model.heritage {
                        debug!("{} extends {}", key, parent.name);
                        members.push(self.resolve_reference(parent, scope)?);
                    }
                    if !properties.is_empty() {
                        members.push(Type::Object(properties));
                    }
                    reference_type.type_alias = Some(Type::Combinator(CombinatorKind::AllOf, members));
                }
            }
            DeclarationKind::Enum(_) => {
                return Err(Error::UnsupportedType {
                    description: format!("enum {} used as a reference type", key),
                })
            }
        }

        Ok(reference_type)
    }

    /// Renders a generic argument into its cache key fragment.
    ///
    /// Declared types outside `owner_namespace` (the generic declaration's namespace) are
    /// rendered by qualified name so instantiations over same-named types stay distinct.
    fn label(
        &self,
        expr: &TypeExpr,
        scope: Scope<'_>,
        owner_namespace: &[String],
    ) -> Result<String> {
        let label = match expr {
            TypeExpr::Keyword(Keyword::String) => "String".to_string(),
            TypeExpr::Keyword(Keyword::Number(_)) => "Number".to_string(),
            TypeExpr::Keyword(Keyword::Boolean) => "Boolean".to_string(),
            TypeExpr::Keyword(Keyword::Void) => "Void".to_string(),
            TypeExpr::Array(element) => format!("{}Array", self.label(element, scope, owner_namespace)?),
            TypeExpr::Parenthesized(inner) => self.label(inner, scope, owner_namespace)?,
            TypeExpr::Any
            | TypeExpr::ObjectKeyword
            | TypeExpr::Union(_)
            | TypeExpr::Intersection(_)
            | TypeExpr::TypeLiteral(_) => "Object".to_string(),
            TypeExpr::Reference(reference) => {
                if reference.args.is_empty() {
                    if let Some(bound) = scope.bindings.get(&reference.name) {
                        return Ok(bound.label.clone());
                    }
                }
                if reference.simple_name() == "Array" {
                    let inner = Self::single_argument(reference)?;
                    return Ok(format!("{}Array", self.label(inner, scope, owner_namespace)?));
                }
                let declared = match self.provider.lookup(&reference.name, scope.namespace) {
                    Ok(Some(declaration)) if declaration.namespace != owner_namespace => {
                        Some(declaration.qualified_name())
                    }
                    _ => None,
                };
                let mut label = capitalize(declared.as_deref().unwrap_or(reference.simple_name()));
                for arg in &reference.args {
                    label.push_str(&self.label(arg, scope, owner_namespace)?);
                }
                label
            }
            TypeExpr::Literal(_) | TypeExpr::Function | TypeExpr::Unsupported(_) => {
                return Err(Error::UnsupportedType {
                    description: format!("{:?} as a generic argument", expr),
                })
            }
        };
        Ok(label)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
