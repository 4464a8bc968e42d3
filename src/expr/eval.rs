//! Interpreter for compiled programs.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::expr::ExpressionError;
use crate::expr::parser::{BinaryOp, Expr, Func, GeomVar, Program, Statement, UnaryOp};
use crate::geometry::metrics::{shape_area, shape_centroid, shape_length};
use crate::topology::arc_pool::ArcPool;
use crate::topology::layer::{GeometryType, Record, Shape};

/// A runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    /// Arrays and objects read from records; only compared and copied.
    Json(Value),
}

impl Val {
    pub fn from_json(v: &Value) -> Val {
        match v {
            Value::Null => Val::Null,
            Value::Bool(b) => Val::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Val::Null, Val::Num),
            Value::String(s) => Val::Str(s.clone()),
            other => Val::Json(other.clone()),
        }
    }

    /// Converts to JSON; integral numbers become JSON integers and
    /// non-finite numbers become `null`.
    pub fn into_json(self) -> Value {
        match self {
            Val::Null => Value::Null,
            Val::Bool(b) => Value::Bool(b),
            Val::Num(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                Value::from(n as i64)
            }
            Val::Num(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
            Val::Str(s) => Value::String(s),
            Val::Json(v) => v,
        }
    }

    /// `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            Val::Json(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Json(Value::Array(_)) => "array",
            Val::Json(_) => "object",
        }
    }

    fn display(&self) -> String {
        match self {
            Val::Null => "null".into(),
            Val::Bool(b) => b.to_string(),
            Val::Num(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Val::Num(n) => n.to_string(),
            Val::Str(s) => s.clone(),
            Val::Json(v) => v.to_string(),
        }
    }

    /// Numeric view; `None` for null.
    fn number(&self, op: &str) -> Result<Option<f64>, ExpressionError> {
        match self {
            Val::Null => Ok(None),
            Val::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Val::Num(n) => Ok(Some(*n)),
            Val::Str(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
                ExpressionError::Type(format!("cannot use string \"{s}\" as a number in {op}"))
            }),
            other => Err(ExpressionError::Type(format!(
                "cannot use {} as a number in {op}",
                other.type_name()
            ))),
        }
    }

    /// Ordering used by sorting; nulls sort first, then numbers, then strings.
    pub fn sort_cmp(&self, other: &Val) -> Ordering {
        fn rank(v: &Val) -> u8 {
            match v {
                Val::Null => 0,
                Val::Bool(_) | Val::Num(_) => 1,
                Val::Str(_) => 2,
                Val::Json(_) => 3,
            }
        }
        match (self, other) {
            (Val::Str(a), Val::Str(b)) => a.cmp(b),
            (Val::Json(a), Val::Json(b)) => a.to_string().cmp(&b.to_string()),
            (a, b) if rank(a) == 1 && rank(b) == 1 => {
                let x = a.number("sort").ok().flatten().unwrap_or(f64::NAN);
                let y = b.number("sort").ok().flatten().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

/// Geometry of the feature being evaluated.
#[derive(Clone, Copy, Debug)]
pub struct FeatureContext<'a> {
    pub index: usize,
    pub shape: Option<&'a Shape>,
    pub arcs: &'a ArcPool,
    pub geometry_type: Option<GeometryType>,
}

impl<'a> FeatureContext<'a> {
    pub fn new(
        index: usize,
        shape: Option<&'a Shape>,
        arcs: &'a ArcPool,
        geometry_type: Option<GeometryType>,
    ) -> Self {
        Self {
            index,
            shape,
            arcs,
            geometry_type,
        }
    }

    fn geometry(&self, var: GeomVar) -> Val {
        match var {
            GeomVar::Id => return Val::Num(self.index as f64),
            GeomVar::IsNull => return Val::Bool(self.shape.is_none()),
            GeomVar::PartCount => {
                return Val::Num(self.shape.map_or(0, Shape::part_count) as f64);
            }
            _ => {}
        }
        let (Some(shape), Some(ty)) = (self.shape, self.geometry_type) else {
            return Val::Null;
        };
        match var {
            GeomVar::Area if ty == GeometryType::Polygon => Val::Num(shape_area(shape, self.arcs)),
            GeomVar::Perimeter if ty == GeometryType::Polygon => {
                Val::Num(shape_length(shape, self.arcs))
            }
            GeomVar::Length if ty == GeometryType::Polyline => {
                Val::Num(shape_length(shape, self.arcs))
            }
            GeomVar::Area | GeomVar::Perimeter | GeomVar::Length => Val::Num(0.0),
            GeomVar::X | GeomVar::Y if ty == GeometryType::Point => shape
                .points()
                .and_then(|p| p.first())
                .map_or(Val::Null, |c| Val::Num(if var == GeomVar::X { c.x } else { c.y })),
            _ => shape_centroid(shape, self.arcs, ty).map_or(Val::Null, |c| {
                Val::Num(if matches!(var, GeomVar::X | GeomVar::CentroidX) {
                    c.x
                } else {
                    c.y
                })
            }),
        }
    }
}

fn arith(op: BinaryOp, a: Val, b: Val) -> Result<Val, ExpressionError> {
    if a == Val::Null || b == Val::Null {
        return Ok(Val::Null);
    }
    if op == BinaryOp::Add && (matches!(a, Val::Str(_)) || matches!(b, Val::Str(_))) {
        return Ok(Val::Str(a.display() + &b.display()));
    }
    let sym = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        _ => "%",
    };
    let (Some(x), Some(y)) = (a.number(sym)?, b.number(sym)?) else {
        return Ok(Val::Null);
    };
    Ok(Val::Num(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        _ => x % y,
    }))
}

fn compare(op: BinaryOp, a: &Val, b: &Val) -> Result<Val, ExpressionError> {
    let ord = match (a, b) {
        (Val::Null, _) | (_, Val::Null) => return Ok(Val::Bool(false)),
        (Val::Str(x), Val::Str(y)) => Some(x.cmp(y)),
        _ => {
            let x = a.number("comparison")?;
            let y = b.number("comparison")?;
            x.zip(y).and_then(|(x, y)| x.partial_cmp(&y))
        }
    };
    let Some(ord) = ord else {
        return Ok(Val::Bool(false));
    };
    Ok(Val::Bool(match op {
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    }))
}

fn strict_eq(a: &Val, b: &Val) -> bool {
    a == b
}

fn loose_eq(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Null, Val::Null) => true,
        (Val::Null, _) | (_, Val::Null) => false,
        (Val::Str(_), Val::Num(_) | Val::Bool(_)) | (Val::Num(_) | Val::Bool(_), Val::Str(_)) => {
            match (a.number("=="), b.number("==")) {
                (Ok(Some(x)), Ok(Some(y))) => x == y,
                _ => false,
            }
        }
        (Val::Bool(_), Val::Num(_)) | (Val::Num(_), Val::Bool(_)) => {
            a.number("==").ok().flatten() == b.number("==").ok().flatten()
        }
        _ => strict_eq(a, b),
    }
}

fn call(func: Func, args: Vec<Val>) -> Result<Val, ExpressionError> {
    let mut nums = Vec::with_capacity(args.len());
    for a in &args {
        match a.number("function call")? {
            Some(n) => nums.push(n),
            None => return Ok(Val::Null),
        }
    }
    Ok(Val::Num(match func {
        Func::Round => (nums[0] + 0.5).floor(),
        Func::Floor => nums[0].floor(),
        Func::Ceil => nums[0].ceil(),
        Func::Abs => nums[0].abs(),
        Func::Sqrt => nums[0].sqrt(),
        Func::Pow => nums[0].powf(nums[1]),
        Func::Min => nums.into_iter().fold(f64::INFINITY, f64::min),
        Func::Max => nums.into_iter().fold(f64::NEG_INFINITY, f64::max),
    }))
}

fn eval(expr: &Expr, record: &Record, ctx: &FeatureContext<'_>) -> Result<Val, ExpressionError> {
    Ok(match expr {
        Expr::Null => Val::Null,
        Expr::Bool(b) => Val::Bool(*b),
        Expr::Num(n) => Val::Num(*n),
        Expr::Str(s) => Val::Str(s.clone()),
        Expr::Field(name) => record.get(name).map_or(Val::Null, Val::from_json),
        Expr::Geom(var) => ctx.geometry(*var),
        Expr::Unary(op, e) => {
            let v = eval(e, record, ctx)?;
            match op {
                UnaryOp::Not => Val::Bool(!v.truthy()),
                UnaryOp::Neg => v.number("unary -")?.map_or(Val::Null, |n| Val::Num(-n)),
                UnaryOp::Plus => v.number("unary +")?.map_or(Val::Null, Val::Num),
            }
        }
        Expr::Binary(BinaryOp::And, a, b) => {
            let l = eval(a, record, ctx)?;
            if l.truthy() { eval(b, record, ctx)? } else { l }
        }
        Expr::Binary(BinaryOp::Or, a, b) => {
            let l = eval(a, record, ctx)?;
            if l.truthy() { l } else { eval(b, record, ctx)? }
        }
        Expr::Binary(op, a, b) => {
            let l = eval(a, record, ctx)?;
            let r = eval(b, record, ctx)?;
            match op {
                BinaryOp::Eq => Val::Bool(loose_eq(&l, &r)),
                BinaryOp::Ne => Val::Bool(!loose_eq(&l, &r)),
                BinaryOp::StrictEq => Val::Bool(strict_eq(&l, &r)),
                BinaryOp::StrictNe => Val::Bool(!strict_eq(&l, &r)),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(*op, &l, &r)?,
                _ => arith(*op, l, r)?,
            }
        }
        Expr::Cond(c, a, b) => {
            if eval(c, record, ctx)?.truthy() {
                eval(a, record, ctx)?
            } else {
                eval(b, record, ctx)?
            }
        }
        Expr::Call(func, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, record, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(*func, args)?
        }
    })
}

impl Program {
    pub fn has_assignments(&self) -> bool {
        self.statements
            .iter()
            .any(|s| matches!(s, Statement::Assign(..)))
    }

    /// Fields written by assignments, in statement order.
    pub fn assigned_fields(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|s| match s {
                Statement::Assign(name, _) => Some(name.as_str()),
                Statement::Expr(_) => None,
            })
            .collect()
    }

    /// Rejects reads of fields that are neither in `known` nor assigned by an
    /// earlier statement.
    pub fn check_fields<S: AsRef<str>>(
        &self,
        known: impl IntoIterator<Item = S>,
    ) -> Result<(), ExpressionError> {
        let mut known: hashbrown::HashSet<String> =
            known.into_iter().map(|s| s.as_ref().to_string()).collect();
        for statement in &self.statements {
            let expr = match statement {
                Statement::Assign(_, e) | Statement::Expr(e) => e,
            };
            let mut unknown = None;
            expr.for_each_field(&mut |f| {
                if unknown.is_none() && !known.contains(f) {
                    unknown = Some(f.to_string());
                }
            });
            if let Some(f) = unknown {
                return Err(ExpressionError::UnknownField(f));
            }
            if let Statement::Assign(name, _) = statement {
                known.insert(name.clone());
            }
        }
        Ok(())
    }

    /// Runs every statement against `record`, storing assignments, and
    /// returns the value of the last statement.
    pub fn run(&self, record: &mut Record, ctx: &FeatureContext<'_>) -> Result<Val, ExpressionError> {
        let mut last = Val::Null;
        for statement in &self.statements {
            last = match statement {
                Statement::Expr(e) => eval(e, record, ctx)?,
                Statement::Assign(name, e) => {
                    let v = eval(e, record, ctx)?;
                    record.insert(name.clone(), v.clone().into_json());
                    v
                }
            };
        }
        Ok(last)
    }

    /// Value of the program without modifying `record`.
    pub fn value(&self, record: &Record, ctx: &FeatureContext<'_>) -> Result<Val, ExpressionError> {
        if self.has_assignments() {
            let mut scratch = record.clone();
            return self.run(&mut scratch, ctx);
        }
        let mut last = Val::Null;
        for statement in &self.statements {
            if let Statement::Expr(e) = statement {
                last = eval(e, record, ctx)?;
            }
        }
        Ok(last)
    }
}
