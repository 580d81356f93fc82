use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::net::{IpAddr, Ipv4Addr};

use cim_flow_composition::{
    compose_parallel, ApplicationId, ForwardingObjective, IpPrefix, PolicyParser, PortNumber,
    TrafficSelector, TrafficTreatment,
};

fn host_route(app: u16, host: u32) -> ForwardingObjective {
    let address = IpAddr::V4(Ipv4Addr::from(0x0a00_0000 | host));
    ForwardingObjective::builder(ApplicationId::new(app))
        .with_priority(1)
        .with_selector(
            TrafficSelector::builder()
                .match_ip_dst(IpPrefix::host(address))
                .build(),
        )
        .with_treatment(
            TrafficTreatment::builder()
                .set_output(PortNumber::new(u64::from(host % 48)))
                .build(),
        )
        .add()
}

fn acl(app: u16, port: u16) -> ForwardingObjective {
    ForwardingObjective::builder(ApplicationId::new(app))
        .with_priority(2)
        .with_selector(TrafficSelector::builder().match_tcp_dst(port).build())
        .add()
}

fn benchmark_pairwise_composition(c: &mut Criterion) {
    let a = host_route(1, 7);
    let b = acl(2, 80);
    c.bench_function("compose_parallel_pair", |bencher| {
        bencher.iter(|| compose_parallel(black_box(&a), black_box(&b)))
    });
}

fn benchmark_tree_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_update_forward");

    for routes in [10u32, 100, 500] {
        group.bench_with_input(BenchmarkId::new("parallel", routes), &routes, |bencher, &routes| {
            bencher.iter(|| {
                let mut tree = PolicyParser::parse("1+2").unwrap();
                for port in [22, 80, 443] {
                    tree.update_forward(acl(1, port));
                }
                for host in 0..routes {
                    black_box(tree.update_forward(host_route(2, host)));
                }
                tree
            })
        });

        group.bench_with_input(BenchmarkId::new("nested", routes), &routes, |bencher, &routes| {
            bencher.iter(|| {
                let mut tree = PolicyParser::parse("(1+2)>3/4").unwrap();
                tree.update_forward(acl(1, 80));
                tree.update_forward(acl(2, 80));
                for host in 0..routes {
                    black_box(tree.update_forward(host_route(3, host)));
                    black_box(tree.update_forward(host_route(4, host)));
                }
                tree
            })
        });
    }

    group.finish();
}

fn benchmark_removal_cascade(c: &mut Criterion) {
    c.bench_function("remove_with_100_parents", |bencher| {
        bencher.iter_batched(
            || {
                let mut tree = PolicyParser::parse("1+2").unwrap();
                let trigger = acl(1, 80);
                tree.update_forward(trigger.clone());
                for host in 0..100 {
                    tree.update_forward(host_route(2, host));
                }
                (tree, trigger)
            },
            |(mut tree, trigger)| black_box(tree.update_forward(trigger.as_remove())),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn benchmark_policy_parsing(c: &mut Criterion) {
    c.bench_function("parse_policy", |bencher| {
        bencher.iter(|| PolicyParser::parse(black_box("((1+2)>3/4)+(5>6)")))
    });
}

criterion_group!(
    benches,
    benchmark_pairwise_composition,
    benchmark_tree_updates,
    benchmark_removal_cascade,
    benchmark_policy_parsing
);
criterion_main!(benches);
