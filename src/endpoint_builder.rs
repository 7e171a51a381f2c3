//! Endpoint metadata builder.
//!
//! Walks every controller declaration and its methods, validates parameter bindings and turns
//! annotation facts into normalized [`Controller`] descriptors. Types are resolved through one
//! [`TypeResolver`] per run, whose completed reference types become
//! [`Metadata::reference_types`].

use crate::declaration::{
    Annotated, Annotation, BindingRole, Declaration, DeclarationProvider, HttpVerb, MethodDecl,
    ParameterDecl, ResponseDecl,
};
use crate::error::{Error, Result};
use crate::metadata::{
    CombinatorKind, Controller, Metadata, Method, Parameter, ParameterLocation, PrimitiveKind,
    ResponseType, Security, Type,
};
use crate::type_resolver::{GenericBindings, Scope, TypeResolver, RESPONSE_WRAPPERS};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;

/// Type kinds accepted for path and header parameters
const PATH_SAFE_KINDS: [&str; 10] = [
    "string", "integer", "long", "float", "double", "date", "datetime", "buffer", "boolean",
    "enum",
];

/// Rewrites `:name` segments into `{name}`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|part| match part.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins path fragments under `/`, collapsing duplicate separators and `.`/`..` segments.
/// A trailing separator on the last non-empty fragment is kept.
pub fn join_paths(parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for part in parts {
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
    }
    let trailing = parts
        .iter()
        .rev()
        .find(|part| !part.is_empty())
        .is_some_and(|part| part.ends_with('/'));

    let mut joined = format!("/{}", segments.join("/"));
    if trailing && !segments.is_empty() {
        joined.push('/');
    }
    joined
}

/// Builds [`Metadata`] from the declarations of one provider.
pub struct EndpointBuilder<'a, P: DeclarationProvider + ?Sized> {
    provider: &'a P,
    resolver: TypeResolver<'a, P>,
}

impl<'a, P: DeclarationProvider + ?Sized> EndpointBuilder<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            resolver: TypeResolver::new(provider),
        }
    }

    /// Builds the controllers and collects every reference type they reach.
    ///
    /// # Errors
    ///
    /// Any declaration-graph or endpoint-modeling error aborts the whole build.
    pub fn build(mut self) -> Result<Metadata> {
        let provider = self.provider;
        let mut controllers = Vec::new();
        for declaration in provider.declarations() {
            if !is_controller(declaration) {
                continue;
            }
            controllers.push(self.build_controller(declaration)?);
        }

        let reference_types = self.resolver.finish(&mut controllers);
        info!(
            "Built metadata for {} controllers and {} reference types",
            controllers.len(),
            reference_types.len()
        );
        Ok(Metadata {
            controllers,
            reference_types,
        })
    }

    fn build_controller(&mut self, declaration: &'a Declaration) -> Result<Controller> {
        let name = declaration.name.clone();
        debug!("Generating metadata for controller {}", name);

        let path = declaration
            .paths()
            .first()
            .map(|path| normalize_path(path))
            .unwrap_or_default();
        let no_bindings = GenericBindings::new();
        let scope = Scope::new(&declaration.namespace, &no_bindings);

        let responses = self.responses(&declaration.annotations, scope)?;
        let methods = self.build_methods(declaration, &path)?;

        Ok(Controller {
            location: declaration.source.clone(),
            path,
            methods,
            consumes: single_list(&declaration.annotations, &name, ListKind::Consumes)?,
            produces: produces(&declaration.annotations, &name)?,
            tags: single_list(&declaration.annotations, &name, ListKind::Tags)?,
            security: security(&declaration.annotations),
            responses,
            name,
        })
    }

    /// Methods of the controller and of every ancestor, a subclass method shadowing an
    /// ancestor method of the same name.
    fn build_methods(&mut self, controller: &'a Declaration, controller_path: &str) -> Result<Vec<Method>> {
        let provider = self.provider;
        let mut methods = Vec::new();
        let mut claimed = HashSet::new();
        let mut current = Some((controller, GenericBindings::new()));

        while let Some((declaration, bindings)) = current.take() {
            let Some(model) = declaration.as_model() else {
                break;
            };
            let scope = Scope::new(&declaration.namespace, &bindings);

            for method in model.methods.iter().filter(|m| !m.is_hidden()) {
                let location = format!("{}.{}", declaration.name, method.name);
                let verbs = method.verbs();
                if verbs.len() > 1 {
                    return Err(Error::endpoint(
                        location,
                        format!(
                            "Only one HTTP verb annotation is acceptable, found: {}",
                            verbs.iter().map(HttpVerb::as_str).collect::<Vec<_>>().join(", ")
                        ),
                    ));
                }
                let Some(verb) = verbs.first().copied() else {
                    continue;
                };
                if !claimed.insert(method.name.clone()) {
                    debug!("Method {} is shadowed by a subclass", location);
                    continue;
                }
                methods.push(self.build_method(method, verb, &location, controller_path, scope)?);
            }

            current = match model.heritage.first() {
                Some(base) => {
                    let parent = provider
                        .lookup(&base.name, &declaration.namespace)?
                        .ok_or_else(|| Error::MissingDeclaration {
                            name: base.name.clone(),
                        })?;
                    let parent_bindings = self.resolver.bind_generics(parent, &base.args, scope)?;
                    Some((parent, parent_bindings))
                }
                None => None,
            };
        }
        Ok(methods)
    }

    fn build_method(
        &mut self,
        method: &MethodDecl,
        verb: HttpVerb,
        location: &str,
        controller_path: &str,
        scope: Scope<'_>,
    ) -> Result<Method> {
        debug!("Generating metadata for method {}", location);
        let paths = method.paths();
        if paths.len() > 1 {
            return Err(Error::endpoint(
                location,
                "Only one path annotation is acceptable",
            ));
        }
        let path = paths
            .first()
            .map(|path| format!("/{}", normalize_path(path).trim_start_matches('/')))
            .unwrap_or_default();

        let ty = self.resolver.resolve(method.return_type.as_ref(), scope)?;

        let full_path = join_paths(&[controller_path, &path]);
        let mut parameters = Vec::new();
        for parameter in &method.parameters {
            let built = self.build_parameter(parameter, verb, &full_path, location, scope)?;
            if !matches!(
                built.location,
                ParameterLocation::Context | ParameterLocation::Cookie
            ) {
                parameters.push(built);
            }
        }
        let body_count = count(&parameters, ParameterLocation::Body);
        if body_count > 1 {
            return Err(Error::endpoint(location, "Only one body parameter allowed"));
        }
        if body_count > 0 && count(&parameters, ParameterLocation::FormData) > 0 {
            return Err(Error::endpoint(
                location,
                "Choose either form/file parameters or a body parameter",
            ));
        }

        let default_response = default_response(&ty, example(&method.annotations, location)?);
        let responses = merge_responses(self.responses(&method.annotations, scope)?, default_response);

        Ok(Method {
            name: method.name.clone(),
            verb,
            path,
            parameters,
            ty,
            responses,
            consumes: single_list(&method.annotations, location, ListKind::Consumes)?,
            produces: produces(&method.annotations, location)?,
            tags: single_list(&method.annotations, location, ListKind::Tags)?,
            security: security(&method.annotations),
            summary: method.summary().map(str::to_string),
            description: method.description.clone(),
            deprecated: method.is_deprecated(),
        })
    }

    fn build_parameter(
        &mut self,
        parameter: &ParameterDecl,
        verb: HttpVerb,
        full_path: &str,
        location: &str,
        scope: Scope<'_>,
    ) -> Result<Parameter> {
        let (role, wire_name, collection_format) = match parameter.binding() {
            Some((role, name, format)) => (Some(role), name, format),
            None => (None, None, None),
        };
        let fail = |message: String| {
            Error::endpoint(
                location,
                format!("Invalid parameter '{}': {}", parameter.name, message),
            )
        };
        let name = wire_name.unwrap_or(parameter.name.as_str()).to_string();
        let not_defaulted = !parameter.optional && parameter.default.is_none();

        let mut built = Parameter {
            parameter_name: parameter.name.clone(),
            name,
            location: ParameterLocation::Body,
            ty: Type::Primitive(PrimitiveKind::Object),
            required: not_defaulted,
            description: parameter.description.clone(),
            default: None,
            collection_format: None,
        };

        // context and cookie parameters never contribute a schema
        if let Some(role @ (BindingRole::Context | BindingRole::Cookie)) = role {
            built.location = if role == BindingRole::Context {
                ParameterLocation::Context
            } else {
                ParameterLocation::Cookie
            };
            return Ok(built);
        }

        let needs_body_verb = matches!(
            role,
            None | Some(BindingRole::Form | BindingRole::File | BindingRole::Files | BindingRole::Param)
        );
        if needs_body_verb && !verb.carries_body() {
            return Err(fail(format!("not supported on a {} method", verb.as_str())));
        }

        if matches!(role, Some(BindingRole::File | BindingRole::Files)) {
            built.location = ParameterLocation::FormData;
            built.ty = Type::Primitive(PrimitiveKind::File);
            built.required = !parameter.optional;
            return Ok(built);
        }

        let Some(declared) = parameter.ty.as_ref() else {
            return Err(fail("no valid type assigned".to_string()));
        };
        let ty = self
            .resolver
            .resolve(Some(declared), scope.with_annotations(&parameter.annotations))?;

        match role {
            Some(BindingRole::Path) => {
                if !PATH_SAFE_KINDS.contains(&ty.type_name()) {
                    return Err(fail(format!(
                        "type '{}' can't be passed as a path parameter",
                        ty.type_name()
                    )));
                }
                let braced = format!("{{{}}}", built.name);
                let colon = format!(":{}", built.name);
                if !full_path.contains(&braced) && !full_path.contains(&colon) {
                    return Err(fail(format!("can't match in path '{}'", full_path)));
                }
                built.location = ParameterLocation::Path;
                built.required = true;
                built.ty = ty;
            }
            Some(BindingRole::Query) => {
                built.ty = if is_query_safe(&ty) {
                    ty
                } else {
                    collapse_array_union(&ty).ok_or_else(|| {
                        fail(format!(
                            "type '{}' can't be passed as a query parameter",
                            ty.type_name()
                        ))
                    })?
                };
                built.location = ParameterLocation::Query;
                built.default = parameter.default.clone();
                built.collection_format = collection_format.map(str::to_string);
            }
            Some(BindingRole::Header) => {
                if !PATH_SAFE_KINDS.contains(&ty.type_name()) {
                    return Err(fail(format!(
                        "type '{}' can't be passed as a header parameter",
                        ty.type_name()
                    )));
                }
                built.location = ParameterLocation::Header;
                built.ty = ty;
            }
            Some(BindingRole::Form) => {
                built.location = ParameterLocation::FormData;
                built.ty = ty;
            }
            Some(BindingRole::Param) => {
                built.location = ParameterLocation::Param;
                built.required = !parameter.optional;
                built.ty = ty;
            }
            _ => {
                built.name = parameter.name.clone();
                built.ty = ty;
            }
        }
        Ok(built)
    }

    fn responses(&mut self, annotations: &[Annotation], scope: Scope<'_>) -> Result<Vec<ResponseType>> {
        let mut responses = Vec::new();
        for annotation in annotations {
            let Annotation::Response(declared) = annotation else {
                continue;
            };
            responses.push(self.response(declared, scope)?);
        }
        Ok(responses)
    }

    fn response(&mut self, declared: &ResponseDecl, scope: Scope<'_>) -> Result<ResponseType> {
        let schema = match declared.schema.as_ref() {
            Some(schema) => Some(self.resolver.resolve(Some(schema), scope)?),
            None => None,
        };
        Ok(ResponseType {
            status: declared.status.clone().unwrap_or_else(|| "200".to_string()),
            description: declared.description.clone().unwrap_or_default(),
            schema,
            examples: declared.examples.clone(),
        })
    }
}

fn is_controller(declaration: &Declaration) -> bool {
    declaration.as_model().is_some() && !declaration.paths().is_empty() && !declaration.is_hidden()
}

fn count(parameters: &[Parameter], location: ParameterLocation) -> usize {
    parameters.iter().filter(|p| p.location == location).count()
}

fn is_query_safe(ty: &Type) -> bool {
    ty.type_name() == "array" || PATH_SAFE_KINDS.contains(&ty.type_name())
}

/// `T | T[]` becomes `T[]` when `T` is a path-safe kind.
fn collapse_array_union(ty: &Type) -> Option<Type> {
    let Type::Combinator(CombinatorKind::OneOf, members) = ty else {
        return None;
    };
    let [first, second] = members.as_slice() else {
        return None;
    };
    let (single, element) = match (first, second) {
        (Type::Array(element), single) | (single, Type::Array(element)) => (single, element.as_ref()),
        _ => return None,
    };
    (element == single && PATH_SAFE_KINDS.contains(&single.type_name()))
        .then(|| Type::Array(Box::new(single.clone())))
}

/// The success response implied by a method's return type.
fn default_response(ty: &Type, examples: Option<Value>) -> ResponseType {
    let (status, description, schema) = match ty {
        Type::Primitive(PrimitiveKind::Void) => ("204", "No content", None),
        Type::Reference(reference) if RESPONSE_WRAPPERS.contains(&reference.name.as_str()) => {
            let status = match reference.name.as_str() {
                "NewResource" => "201",
                "RequestAccepted" => "202",
                "MovedPermanently" => "301",
                _ => "302",
            };
            let schema = reference
                .type_argument
                .as_deref()
                .cloned()
                .unwrap_or_else(|| ty.clone());
            (status, "Ok", Some(schema))
        }
        _ => ("200", "Ok", Some(ty.clone())),
    };
    ResponseType {
        status: status.to_string(),
        description: description.to_string(),
        schema,
        examples,
    }
}

/// Merges the default response into the declared ones by status code.
fn merge_responses(mut declared: Vec<ResponseType>, default: ResponseType) -> Vec<ResponseType> {
    match declared.iter_mut().find(|r| r.status == default.status) {
        Some(existing) => {
            if existing.examples.is_none() {
                existing.examples = default.examples;
            }
        }
        None => declared.push(default),
    }
    declared
}

fn example(annotations: &[Annotation], location: &str) -> Result<Option<Value>> {
    let mut examples = annotations.iter().filter_map(|a| match a {
        Annotation::Example(value) => Some(value),
        _ => None,
    });
    let first = examples.next().cloned();
    if examples.next().is_some() {
        return Err(Error::endpoint(location, "Only one example annotation allowed"));
    }
    Ok(first)
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Consumes,
    Produces,
    Accept,
    Tags,
}

impl ListKind {
    fn select<'x>(&self, annotation: &'x Annotation) -> Option<&'x Vec<String>> {
        match (self, annotation) {
            (ListKind::Consumes, Annotation::Consumes(values))
            | (ListKind::Produces, Annotation::Produces(values))
            | (ListKind::Accept, Annotation::Accept(values))
            | (ListKind::Tags, Annotation::Tags(values)) => Some(values),
            _ => None,
        }
    }
}

/// Values of the one annotation of `kind`; more than one such annotation is an error.
fn single_list(annotations: &[Annotation], location: &str, kind: ListKind) -> Result<Vec<String>> {
    let mut found = annotations.iter().filter_map(|a| kind.select(a));
    let values = found.next().cloned().unwrap_or_default();
    if found.next().is_some() {
        return Err(Error::endpoint(
            location,
            format!("Only one {:?} annotation allowed", kind),
        ));
    }
    Ok(values)
}

fn produces(annotations: &[Annotation], location: &str) -> Result<Vec<String>> {
    let produces = single_list(annotations, location, ListKind::Produces)?;
    if !produces.is_empty() {
        return Ok(produces);
    }
    single_list(annotations, location, ListKind::Accept)
}

fn security(annotations: &[Annotation]) -> Option<Vec<Security>> {
    let securities: Vec<Security> = annotations
        .iter()
        .filter_map(|a| match a {
            Annotation::Security { scopes, name } => Some(Security {
                name: name.clone().unwrap_or_else(|| "default".to_string()),
                scopes: scopes.clone(),
            }),
            _ => None,
        })
        .collect();
    (!securities.is_empty()).then_some(securities)
}
