//! Tree-walking evaluator for filter scripts.
//!
//! Scripts edit the working image in place through `pixels[x, y] = ...`.
//! A neighborhood filter written as a script must call `makeRef()` first and
//! sample through `loadRef`; `loadColor` reads the image being written.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use log::{trace, warn};

use crate::error::FilterError;
use crate::filters::{PixelBuffer, RawColor, ReferenceSnapshot};
use crate::script::parser::{BinOp, Expr, Target, UnaryOp, PIXELS};
use crate::script::{ScriptError, ScriptLimits};

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    LoadColor,
    MakeRef,
    LoadRef,
    Rgb,
    Sqrt,
}

impl Builtin {
    const ALL: [Builtin; 5] = [
        Builtin::LoadColor,
        Builtin::MakeRef,
        Builtin::LoadRef,
        Builtin::Rgb,
        Builtin::Sqrt,
    ];

    fn name(self) -> &'static str {
        match self {
            Builtin::LoadColor => "loadColor",
            Builtin::MakeRef => "makeRef",
            Builtin::LoadRef => "loadRef",
            Builtin::Rgb => "rgb",
            Builtin::Sqrt => "sqrt",
        }
    }

    fn arity(self) -> usize {
        match self {
            Builtin::MakeRef => 0,
            Builtin::Sqrt => 1,
            Builtin::LoadColor | Builtin::LoadRef => 2,
            Builtin::Rgb => 3,
        }
    }
}

pub struct Closure {
    params: Vec<String>,
    body: Rc<Expr>,
    env: Scope,
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Num(f64),
    Color(RawColor),
    /// The working image, bound to `pixels`.
    Image,
    Func(Rc<Closure>),
    Builtin(Builtin),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Color(_) => "color",
            Value::Image => "image",
            Value::Func(_) | Value::Builtin(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(false) => false,
            Value::Num(n) => *n != 0.0,
            _ => true,
        }
    }

    fn num(&self) -> Result<f64, ScriptError> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(ScriptError::Type(format!("expected number, got {}", other.type_name()))),
        }
    }

    fn loosely_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Image, Value::Image) => true,
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Color(c) => write!(f, "rgb({}, {}, {})", c.r, c.g, c.b),
            Value::Image => write!(f, "<image>"),
            Value::Func(c) => write!(f, "<lambda/{}>", c.params.len()),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name()),
        }
    }
}

// ============================================================================
// Scopes
// ============================================================================

type Scope = Rc<RefCell<Frame>>;

#[derive(Default)]
struct Frame {
    vars: HashMap<String, Value>,
    parent: Option<Scope>,
}

fn child_scope(parent: &Scope) -> Scope {
    Rc::new(RefCell::new(Frame {
        vars: HashMap::new(),
        parent: Some(Rc::clone(parent)),
    }))
}

fn lookup(scope: &Scope, name: &str) -> Option<Value> {
    let frame = scope.borrow();
    match frame.vars.get(name) {
        Some(value) => Some(value.clone()),
        None => frame.parent.as_ref().and_then(|p| lookup(p, name)),
    }
}

/// Update the nearest binding of `name`, or define it in `scope`.
fn assign(scope: &Scope, name: &str, value: Value) {
    let mut current = Rc::clone(scope);
    loop {
        let parent = {
            let mut frame = current.borrow_mut();
            if let Some(slot) = frame.vars.get_mut(name) {
                *slot = value;
                return;
            }
            frame.parent.clone()
        };
        match parent {
            Some(parent) => current = parent,
            None => break,
        }
    }
    scope.borrow_mut().vars.insert(name.to_string(), value);
}

// ============================================================================
// Interpreter
// ============================================================================

pub struct Interpreter<'a> {
    image: &'a mut PixelBuffer,
    reference: Option<ReferenceSnapshot>,
    globals: Scope,
    /// Scopes closed over by lambdas, cleared on drop to break
    /// scope -> closure -> scope cycles.
    captured: Vec<Weak<RefCell<Frame>>>,
    limits: ScriptLimits,
    steps: u64,
    /// Active lambda calls.
    depth: usize,
    /// Active `eval` frames, across calls.
    nesting: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(image: &'a mut PixelBuffer, limits: ScriptLimits) -> Self {
        let globals: Scope = Rc::default();
        {
            let mut frame = globals.borrow_mut();
            frame.vars.insert("width".into(), Value::Num(image.width() as f64));
            frame.vars.insert("height".into(), Value::Num(image.height() as f64));
            frame.vars.insert(PIXELS.into(), Value::Image);
            for builtin in Builtin::ALL {
                frame.vars.insert(builtin.name().into(), Value::Builtin(builtin));
            }
        }
        Self {
            image,
            reference: None,
            globals,
            captured: Vec::new(),
            limits,
            steps: 0,
            depth: 0,
            nesting: 0,
        }
    }

    /// Steps evaluated so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn run(&mut self, program: &Expr) -> Result<Value, ScriptError> {
        let globals = Rc::clone(&self.globals);
        let result = self.eval(program, &globals);
        trace!("script finished after {} steps", self.steps);
        result
    }

    fn tick(&mut self) -> Result<(), ScriptError> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            warn!("script aborted: step limit of {} reached", self.limits.max_steps);
            return Err(ScriptError::StepLimitExceeded(self.limits.max_steps));
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, ScriptError> {
        self.tick()?;
        if self.nesting >= self.limits.max_nesting {
            return Err(ScriptError::NestingLimit(self.limits.max_nesting));
        }
        self.nesting += 1;
        let result = self.eval_node(expr, scope);
        self.nesting -= 1;
        result
    }

    fn eval_node(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, ScriptError> {
        match expr {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => lookup(scope, name).ok_or_else(|| ScriptError::UndefinedVariable(name.clone())),

            Expr::Assign { target: Target::Var(name), value } => {
                let value = self.eval(value, scope)?;
                assign(scope, name, value.clone());
                Ok(value)
            }
            Expr::Assign { target: Target::Pixel { x, y }, value } => {
                let (x, y) = self.coordinates(x, y, scope)?;
                let value = self.eval(value, scope)?;
                let Value::Color(color) = &value else {
                    return Err(ScriptError::Type(format!(
                        "pixels can only hold colors, got {}",
                        value.type_name()
                    )));
                };
                self.image.set(x, y, *color)?;
                Ok(value)
            }

            Expr::Binary { first, rest } => {
                let mut acc = self.eval(first, scope)?;
                for (op, operand) in rest {
                    acc = match op {
                        BinOp::And if !acc.truthy() => Value::Bool(false),
                        BinOp::Or if acc.truthy() => acc,
                        BinOp::And | BinOp::Or => self.eval(operand, scope)?,
                        _ => {
                            let right = self.eval(operand, scope)?;
                            binary(*op, &acc, &right)?
                        }
                    };
                }
                Ok(acc)
            }

            Expr::Unary { op: UnaryOp::Neg, operand } => Ok(Value::Num(-self.eval(operand, scope)?.num()?)),
            Expr::Unary { op: UnaryOp::Not, operand } => Ok(Value::Bool(!self.eval(operand, scope)?.truthy())),

            Expr::Call { func, args } => {
                let func = self.eval(func, scope)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(func, args)
            }

            Expr::Index { target, index } => {
                let target = self.eval(target, scope)?;
                let Value::Image = target else {
                    return Err(ScriptError::Type(format!("cannot index {}", target.type_name())));
                };
                let [x, y] = index.as_slice() else {
                    return Err(ScriptError::Type("pixels index must be [x, y]".to_string()));
                };
                let (x, y) = self.coordinates(x, y, scope)?;
                let color = self.image.get(x, y)?;
                Ok(Value::Color(color.into()))
            }

            Expr::If { cond, then, otherwise } => {
                if self.eval(cond, scope)?.truthy() {
                    self.eval(then, scope)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise, scope)
                } else {
                    Ok(Value::Bool(false))
                }
            }

            Expr::Lambda { params, body } => {
                if !self.captured.last().is_some_and(|last| last.ptr_eq(&Rc::downgrade(scope))) {
                    self.captured.push(Rc::downgrade(scope));
                }
                Ok(Value::Func(Rc::new(Closure {
                    params: params.clone(),
                    body: Rc::clone(body),
                    env: Rc::clone(scope),
                })))
            }

            Expr::For { init, cond, incr, body } => {
                let scope = child_scope(scope);
                self.eval(init, &scope)?;
                while self.eval(cond, &scope)?.truthy() {
                    self.eval(body, &scope)?;
                    self.eval(incr, &scope)?;
                }
                Ok(Value::Nil)
            }

            Expr::Block(exprs) => {
                let mut last = Value::Bool(false);
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn call(&mut self, func: Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        match func {
            Value::Builtin(builtin) => {
                check_arity(builtin.name(), builtin.arity(), args.len())?;
                self.call_builtin(builtin, &args)
            }
            Value::Func(closure) => {
                check_arity("lambda", closure.params.len(), args.len())?;
                if self.depth >= self.limits.max_call_depth {
                    return Err(ScriptError::RecursionLimit(self.limits.max_call_depth));
                }
                let scope = child_scope(&closure.env);
                {
                    let mut frame = scope.borrow_mut();
                    for (name, value) in closure.params.iter().zip(args) {
                        frame.vars.insert(name.clone(), value);
                    }
                }
                self.depth += 1;
                let result = self.eval(&closure.body, &scope);
                self.depth -= 1;
                result
            }
            other => Err(ScriptError::NotCallable(other.type_name().to_string())),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: &[Value]) -> Result<Value, ScriptError> {
        match builtin {
            Builtin::LoadColor => {
                let (x, y) = self.coordinate_values(&args[0], &args[1])?;
                let color = self.image.get(x, y)?;
                self.load_rgb(color.into());
                Ok(Value::Nil)
            }
            Builtin::MakeRef => {
                self.reference = Some(ReferenceSnapshot::capture(&*self.image));
                Ok(Value::Nil)
            }
            Builtin::LoadRef => {
                let (x, y) = self.coordinate_values(&args[0], &args[1])?;
                let reference = self.reference.as_ref().ok_or(ScriptError::MissingReference)?;
                let color = reference.view().get(x, y)?;
                self.load_rgb(color.into());
                Ok(Value::Nil)
            }
            Builtin::Rgb => {
                let r = args[0].num()?;
                let g = args[1].num()?;
                let b = args[2].num()?;
                Ok(Value::Color(RawColor::new(r, g, b).map(f64::trunc)))
            }
            Builtin::Sqrt => {
                let v = args[0].num()?;
                if v < 0.0 {
                    return Err(ScriptError::Domain(format!("sqrt of negative number {v}")));
                }
                Ok(Value::Num(v.sqrt()))
            }
        }
    }

    /// Bind r, g, b in the global scope.
    fn load_rgb(&mut self, color: RawColor) {
        let mut frame = self.globals.borrow_mut();
        frame.vars.insert("r".into(), Value::Num(color.r));
        frame.vars.insert("g".into(), Value::Num(color.g));
        frame.vars.insert("b".into(), Value::Num(color.b));
    }

    fn coordinates(&mut self, x: &Expr, y: &Expr, scope: &Scope) -> Result<(usize, usize), ScriptError> {
        let x = self.eval(x, scope)?;
        let y = self.eval(y, scope)?;
        self.coordinate_values(&x, &y)
    }

    /// Truncate numeric coordinates; negative or non-finite ones are off the image.
    fn coordinate_values(&self, x: &Value, y: &Value) -> Result<(usize, usize), ScriptError> {
        let (x, y) = (x.num()?.trunc(), y.num()?.trunc());
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return Err(FilterError::OutOfRange {
                x: x as i64,
                y: y as i64,
                width: self.image.width(),
                height: self.image.height(),
            }
            .into());
        }
        Ok((x as usize, y as usize))
    }
}

impl Drop for Interpreter<'_> {
    fn drop(&mut self) {
        // Emptying every captured scope and its ancestors drops the closures
        // stored there, which releases the scopes they hold
        for weak in self.captured.drain(..) {
            let mut next = weak.upgrade();
            while let Some(scope) = next {
                let mut frame = scope.borrow_mut();
                let vars = std::mem::take(&mut frame.vars);
                next = frame.parent.clone();
                drop(frame);
                drop(vars);
            }
        }
        let vars = std::mem::take(&mut self.globals.borrow_mut().vars);
        drop(vars);
    }
}

fn check_arity(name: &str, expected: usize, actual: usize) -> Result<(), ScriptError> {
    if expected != actual {
        return Err(ScriptError::Arity {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(left.loosely_eq(right))),
        BinOp::Ne => return Ok(Value::Bool(!left.loosely_eq(right))),
        _ => {}
    }

    let (a, b) = (left.num()?, right.num()?);
    let divisor = |b: f64| if b == 0.0 { Err(ScriptError::DivisionByZero) } else { Ok(b) };

    Ok(match op {
        BinOp::Add => Value::Num(a + b),
        BinOp::Sub => Value::Num(a - b),
        BinOp::Mul => Value::Num(a * b),
        BinOp::Div => Value::Num(a / divisor(b)?),
        BinOp::FloorDiv => Value::Num((a / divisor(b)?).floor()),
        // Floor modulo: the result takes the sign of the divisor
        BinOp::Mod => Value::Num(a - divisor(b)? * (a / b).floor()),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::Eq | BinOp::Ne => unreachable!("handled above"),
        BinOp::And | BinOp::Or => unreachable!("short-circuited by the evaluator"),
    })
}
