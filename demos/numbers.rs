use sovran_symbolmap::prelude::*;
use std::any::Any;

// Accepts any numeric representation and narrows it to an i64
fn integral(o: &dyn Any) -> Option<i64> {
    if let Some(v) = o.downcast_ref::<i32>() {
        return Some(i64::from(*v));
    }
    if let Some(v) = o.downcast_ref::<f64>() {
        return v.is_finite().then(|| v.trunc() as i64);
    }
    o.downcast_ref::<String>().and_then(|s| s.trim().parse().ok())
}

fn main() -> Result<(), MapError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let total = InternalSymbol::named("total", Unifying::<i64>::with_fallback_value(integral, 0)?);
    let even = InternalSymbol::named(
        "even",
        Unifying::<i64>::define(integral, |n| n % 2 == 0, || 0)?,
    );

    // Adapting outside of any store
    for input in [
        Box::new(42i32) as Box<dyn Any>,
        Box::new(2.75f64),
        Box::new(" 17 ".to_string()),
        Box::new(f64::NAN),
        Box::new('x'),
    ] {
        let result = total.adapt(Some(input.as_ref()));
        println!(
            "{:<10} -> {:?}",
            format!("{:?}", result.get()),
            result.fallback().resolve()
        );
    }

    let context = SymbolContext::<SymbolKey>::new();

    for n in [3i64, 4, 5, 6] {
        context.merge(&total, n, |a, b| Some(a + b))?;
        match context.put(&even, n) {
            Ok(previous) => println!("even <- {} (was {:?})", n, previous),
            Err(e) => println!("even refused {}: {}", n, e),
        }
    }
    println!("total = {:?}", context.get(&total)?);
    println!("even = {:?}", context.get(&even)?);

    // A combination the symbol refuses drops the entry
    context.merge(&even, 2, |a, b| Some(a + b + 1))?;
    println!("even after odd merge = {:?}, falls back to {:?}", context.get(&even)?, context.give(&even)?);

    Ok(())
}
