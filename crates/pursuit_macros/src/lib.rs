use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, Pat};

/// Time a simulation system when the `perf_stats` feature is enabled.
///
/// The function body is wrapped in a drop guard that measures wall time
/// and logs through Bevy's `info!` when the guard goes out of scope.
/// Without the feature the guard is never built.
///
/// # Tick detection
/// If the function takes a parameter named `tick` whose type mentions
/// `SimTick`, the guard also logs every 100th tick regardless of duration,
/// which gives a steady heartbeat line for each profiled system.
///
/// # Example
/// ```ignore
/// #[profile(2)] // log when slower than 2ms
/// pub fn dispatch_agents(tick: Res<SimTick>, mut agents: ResMut<AgentTable>) {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        attr.to_string().trim().parse().unwrap_or(1)
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name_str = sig.ident.to_string();

    let tick_ident = sig.inputs.iter().find_map(|arg| {
        let FnArg::Typed(pat_type) = arg else {
            return None;
        };
        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return None;
        };
        let ty = &pat_type.ty;
        let type_str = quote!(#ty).to_string();
        (pat_ident.ident == "tick" && type_str.contains("SimTick")).then(|| pat_ident.ident.clone())
    });

    let tick_value = match &tick_ident {
        Some(ident) => quote! { Some(#ident.0) },
        None => quote! { None },
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_timer = {
                struct ProfileGuard {
                    name: &'static str,
                    start: std::time::Instant,
                    tick: Option<u64>,
                }
                impl Drop for ProfileGuard {
                    fn drop(&mut self) {
                        let elapsed = self.start.elapsed();
                        let heartbeat = self.tick.map_or(false, |t| t % 100 == 0);
                        if elapsed.as_millis() > #threshold_ms || heartbeat {
                            bevy::prelude::info!("[PERF] {}: {:?}", self.name, elapsed);
                        }
                    }
                }
                ProfileGuard {
                    name: #fn_name_str,
                    start: std::time::Instant::now(),
                    tick: #tick_value,
                }
            };

            #block
        }
    };

    output.into()
}
