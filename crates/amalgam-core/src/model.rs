//! Reference model of the units taking part in a merge
//!
//! The model is read-only input. Types live in an arena (the units' own type
//! vectors) and every edge between them is a full-name lookup through the
//! model's index, so cyclic references never need owning pointers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Whether a unit's public surface is preserved verbatim or may be internalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRole {
    Primary,
    Secondary,
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitRole::Primary => write!(f, "primary"),
            UnitRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// A reference to a type from a signature, a base list or a generic argument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// Plain reference by full name
    Named { name: String },
    /// Instantiation of a generic element type, e.g. `List<Foo>`
    Generic {
        element: Box<TypeRef>,
        arguments: Vec<TypeRef>,
    },
    /// Unbound generic parameter such as `T`; never a reachability candidate
    GenericParameter { name: String },
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named { name: name.into() }
    }

    pub fn generic(element: TypeRef, arguments: Vec<TypeRef>) -> Self {
        TypeRef::Generic {
            element: Box::new(element),
            arguments,
        }
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        TypeRef::GenericParameter { name: name.into() }
    }

    /// Name of the referenced definition. For an instantiation this is the
    /// element type's name; generic parameters have none.
    pub fn element_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name } => Some(name),
            TypeRef::Generic { element, .. } => element.element_name(),
            TypeRef::GenericParameter { .. } => None,
        }
    }

    pub fn is_generic_parameter(&self) -> bool {
        matches!(self, TypeRef::GenericParameter { .. })
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name } | TypeRef::GenericParameter { name } => write!(f, "{}", name),
            TypeRef::Generic { element, arguments } => {
                write!(f, "{}<", element)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// A method, or a property accessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub public: bool,
    /// `None` for void
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub parameters: Vec<TypeRef>,
}

impl Method {
    pub fn public(name: impl Into<String>, return_type: Option<TypeRef>, parameters: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            public: true,
            return_type,
            parameters,
        }
    }

    pub fn private(name: impl Into<String>, return_type: Option<TypeRef>, parameters: Vec<TypeRef>) -> Self {
        Self {
            public: false,
            ..Self::public(name, return_type, parameters)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub getter: Option<Method>,
    #[serde(default)]
    pub setter: Option<Method>,
}

impl Property {
    /// Read-only property with a public getter
    pub fn get(name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        Self {
            getter: Some(Method::public(format!("get_{}", name), Some(ty), Vec::new())),
            setter: None,
            name,
        }
    }

    /// Write-only property with a public setter
    pub fn set(name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        Self {
            getter: None,
            setter: Some(Method::public(format!("set_{}", name), None, vec![ty])),
            name,
        }
    }

    /// Property with a public getter and a public setter of the same type
    pub fn get_set(name: impl Into<String>, ty: TypeRef) -> Self {
        let mut property = Self::get(name, ty.clone());
        property.setter = Some(Method::public(format!("set_{}", property.name), None, vec![ty]));
        property
    }

    pub fn public_getter(&self) -> Option<&Method> {
        self.getter.as_ref().filter(|m| m.public)
    }

    pub fn public_setter(&self) -> Option<&Method> {
        self.setter.as_ref().filter(|m| m.public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub public: bool,
    pub field_type: TypeRef,
}

/// A type definition contributed by a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Namespace-qualified name; nested types use `Outer/Inner`
    pub full_name: String,
    #[serde(default)]
    pub base: Option<TypeRef>,
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl TypeDef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            fields: Vec::new(),
        }
    }
}

/// A name that is not defined in its unit but redirected to another unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedType {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    /// Unit the name is redirected to
    pub target_unit: String,
    #[serde(default)]
    pub declaring_type: Option<Box<ForwardedType>>,
}

impl ForwardedType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, target_unit: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            target_unit: target_unit.into(),
            declaring_type: None,
        }
    }

    /// Nest this entry inside `declaring`; nested entries carry no namespace
    pub fn nested_in(mut self, declaring: ForwardedType) -> Self {
        self.namespace.clear();
        self.declaring_type = Some(Box::new(declaring));
        self
    }

    pub fn full_name(&self) -> String {
        match &self.declaring_type {
            Some(declaring) => format!("{}/{}", declaring.full_name(), self.name),
            None if self.namespace.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.namespace, self.name),
        }
    }
}

/// A compiled unit participating in the merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub role: UnitRole,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub forwarded_types: Vec<ForwardedType>,
}

impl Unit {
    pub fn is_primary(&self) -> bool {
        self.role == UnitRole::Primary
    }
}

/// Position of a type definition inside the model's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    pub unit: usize,
    pub index: usize,
}

/// All units of one merge run plus a full-name index over their types
#[derive(Debug, Clone)]
pub struct ReferenceModel {
    units: Vec<Unit>,
    primary: usize,
    index: HashMap<String, TypeHandle>,
}

impl ReferenceModel {
    /// Build the model. Exactly one unit must be primary. Duplicate full names
    /// are not rejected; the first definition in unit order wins the index.
    pub fn new(units: Vec<Unit>) -> Result<Self, ModelError> {
        let mut primary: Option<usize> = None;
        for (i, unit) in units.iter().enumerate() {
            if unit.is_primary() {
                if let Some(first) = primary {
                    return Err(ModelError::MultiplePrimaries {
                        first: units[first].name.clone(),
                        second: unit.name.clone(),
                    });
                }
                primary = Some(i);
            }
        }
        let primary = primary.ok_or(ModelError::MissingPrimary)?;

        let mut index = HashMap::new();
        for (unit_idx, unit) in units.iter().enumerate() {
            for (type_idx, ty) in unit.types.iter().enumerate() {
                index.entry(ty.full_name.clone()).or_insert(TypeHandle {
                    unit: unit_idx,
                    index: type_idx,
                });
            }
        }

        Ok(Self {
            units,
            primary,
            index,
        })
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn primary(&self) -> &Unit {
        &self.units[self.primary]
    }

    /// Secondary units in declaration order
    pub fn secondaries(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| !u.is_primary())
    }

    pub fn unit(&self, name: &str) -> Result<&Unit, ModelError> {
        self.units
            .iter()
            .find(|u| u.name == name)
            .ok_or_else(|| ModelError::UnitNotFound(name.to_string()))
    }

    pub fn get(&self, handle: TypeHandle) -> &TypeDef {
        &self.units[handle.unit].types[handle.index]
    }

    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        self.index.get(full_name).map(|&h| self.get(h))
    }

    /// Unit that defines `full_name`, if any unit in the merge set does
    pub fn defining_unit(&self, full_name: &str) -> Option<&Unit> {
        self.index.get(full_name).map(|h| &self.units[h.unit])
    }

    /// Resolve a reference to its definition. Instantiations resolve to their
    /// element type. Generic parameters and names outside the merge set are
    /// unresolved.
    pub fn resolve(&self, reference: &TypeRef) -> Option<&TypeDef> {
        reference.element_name().and_then(|name| self.find_type(name))
    }
}

/// Fluent construction of units, mostly for tests and embedding code
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    unit: Unit,
}

impl UnitBuilder {
    pub fn primary(name: impl Into<String>) -> Self {
        Self::with_role(name, UnitRole::Primary)
    }

    pub fn secondary(name: impl Into<String>) -> Self {
        Self::with_role(name, UnitRole::Secondary)
    }

    fn with_role(name: impl Into<String>, role: UnitRole) -> Self {
        Self {
            unit: Unit {
                name: name.into(),
                role,
                types: Vec::new(),
                forwarded_types: Vec::new(),
            },
        }
    }

    pub fn add_type(mut self, ty: impl Into<TypeDef>) -> Self {
        self.unit.types.push(ty.into());
        self
    }

    pub fn forward(mut self, forwarded: ForwardedType) -> Self {
        self.unit.forwarded_types.push(forwarded);
        self
    }

    pub fn build(self) -> Unit {
        self.unit
    }
}

#[derive(Debug, Clone)]
pub struct TypeBuilder {
    ty: TypeDef,
}

impl TypeBuilder {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            ty: TypeDef::new(full_name),
        }
    }

    pub fn base(mut self, base: TypeRef) -> Self {
        self.ty.base = Some(base);
        self
    }

    pub fn interface(mut self, interface: TypeRef) -> Self {
        self.ty.interfaces.push(interface);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.ty.methods.push(method);
        self
    }

    /// Public method returning `ty` with no parameters
    pub fn returns(self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.method(Method::public(name, Some(ty), Vec::new()))
    }

    /// Public void method taking `params`
    pub fn accepts(self, name: impl Into<String>, params: Vec<TypeRef>) -> Self {
        self.method(Method::public(name, None, params))
    }

    pub fn property(mut self, property: Property) -> Self {
        self.ty.properties.push(property);
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.ty.fields.push(Field {
            name: name.into(),
            public: true,
            field_type: ty,
        });
        self
    }

    pub fn private_field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.ty.fields.push(Field {
            name: name.into(),
            public: false,
            field_type: ty,
        });
        self
    }

    pub fn build(self) -> TypeDef {
        self.ty
    }
}

impl From<TypeBuilder> for TypeDef {
    fn from(builder: TypeBuilder) -> Self {
        builder.build()
    }
}

impl From<&str> for TypeDef {
    fn from(full_name: &str) -> Self {
        TypeDef::new(full_name)
    }
}
